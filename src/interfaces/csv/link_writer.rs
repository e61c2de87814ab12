use crate::application::registry::PaymentLink;
use crate::error::Result;
use std::io::Write;

/// Writes payment links as `label,url` rows.
pub struct LinkWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LinkWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_links(&mut self, links: &[PaymentLink]) -> Result<()> {
        self.writer.write_record(["label", "url"])?;
        for link in links {
            self.writer.write_record([link.label.as_str(), link.url.as_str()])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_links() {
        let links = vec![
            PaymentLink {
                label: "a@example.com".into(),
                url: "solana:abc?amount=1.000000000&reference=def".into(),
            },
            PaymentLink {
                label: "Participant 2".into(),
                url: "solana:abc?amount=1.000000000&reference=ghi".into(),
            },
        ];
        let mut out = Vec::new();
        LinkWriter::new(&mut out).write_links(&links).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "label,url\n\
             a@example.com,solana:abc?amount=1.000000000&reference=def\n\
             Participant 2,solana:abc?amount=1.000000000&reference=ghi\n"
        );
    }
}
