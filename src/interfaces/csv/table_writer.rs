use crate::domain::form::Form;
use crate::domain::ticket::Ticket;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct FormRow<'a> {
    id: &'a str,
    name: &'a str,
    wallet: &'a str,
    webhook: &'a str,
    description: &'a str,
    flatrate: bool,
    amount: u64,
}

#[derive(Serialize)]
struct TicketRow<'a> {
    form: &'a str,
    name: &'a str,
    email: &'a str,
    ltext: &'a str,
    sats: u64,
}

/// Writes the admin tables as CSV, one header row followed by one row per entry.
pub struct TableWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> TableWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_forms(mut self, forms: &[Form]) -> Result<()> {
        if forms.is_empty() {
            self.writer.write_record([
                "id",
                "name",
                "wallet",
                "webhook",
                "description",
                "flatrate",
                "amount",
            ])?;
        }
        for form in forms {
            self.writer.serialize(FormRow {
                id: &form.id,
                name: &form.name,
                wallet: &form.wallet,
                webhook: form.webhook.as_deref().unwrap_or_default(),
                description: &form.description,
                flatrate: form.flatrate,
                amount: form.amount,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_tickets(mut self, tickets: &[Ticket]) -> Result<()> {
        if tickets.is_empty() {
            self.writer
                .write_record(["form", "name", "email", "ltext", "sats"])?;
        }
        for ticket in tickets {
            self.writer.serialize(TicketRow {
                form: &ticket.form,
                name: &ticket.name,
                email: &ticket.email,
                ltext: &ticket.ltext,
                sats: ticket.sats,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn form(id: &str, description: &str, webhook: Option<&str>) -> Form {
        Form {
            id: id.into(),
            wallet: "w1".into(),
            name: "Support".into(),
            webhook: webhook.map(String::from),
            description: description.into(),
            flatrate: false,
            amount: 2,
            amountmade: 0,
            time: DateTime::from_timestamp(0, 0).unwrap(),
        }
    }

    #[test]
    fn test_write_forms() {
        let mut out = Vec::new();
        TableWriter::new(&mut out)
            .write_forms(&[
                form("f1", "Ask, anything", None),
                form("f2", "plain", Some("https://example.com/hook")),
            ])
            .unwrap();

        let csv = String::from_utf8(out).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "id,name,wallet,webhook,description,flatrate,amount");
        assert_eq!(lines[1], "f1,Support,w1,,\"Ask, anything\",false,2");
        assert_eq!(lines[2], "f2,Support,w1,https://example.com/hook,plain,false,2");
    }

    #[test]
    fn test_empty_tables_still_have_headers() {
        let mut out = Vec::new();
        TableWriter::new(&mut out).write_tickets(&[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "form,name,email,ltext,sats\n");
    }
}
