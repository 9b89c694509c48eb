//! Contact-card payload building and external code rendering.
//!
//! The payload is plain vCard 3.0 text; rasterizing it into a scannable
//! square is delegated to an external image service reached over HTTP GET
//! with the payload URL-encoded in the query string.

use super::{layout::BadgeRecord, BadgeError};

/// Fields embedded in the scannable contact code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactCard {
    pub first_name: String,
    pub last_name: String,
    pub organization: String,
    pub title: String,
    pub url: String,
}

impl ContactCard {
    pub fn from_record(record: &BadgeRecord) -> Self {
        Self {
            first_name: record.en_firstname.clone().unwrap_or_default(),
            last_name: record.en_lastname.clone().unwrap_or_default(),
            organization: record.company().to_string(),
            title: record.emp_id.map(|id| id.to_string()).unwrap_or_default(),
            url: record.website().to_string(),
        }
    }

    /// Deterministic newline-delimited payload: identical fields always
    /// produce the identical string.
    pub fn payload(&self) -> Result<String, BadgeError> {
        for (label, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("organization", &self.organization),
            ("title", &self.title),
            ("url", &self.url),
        ] {
            if value.contains('\n') || value.contains('\r') {
                return Err(BadgeError::Encoding(format!(
                    "field {label} contains a line break"
                )));
            }
        }

        Ok(format!(
            "BEGIN:VCARD\nVERSION:3.0\nN:{last};{first}\nFN:{first} {last}\nORG:{org}\nTITLE:{title}\nURL:{url}\nEND:VCARD",
            last = self.last_name,
            first = self.first_name,
            org = self.organization,
            title = self.title,
            url = self.url,
        ))
    }
}

/// External code-rendering endpoint.
#[derive(Clone, Debug)]
pub struct CodeService {
    endpoint: String,
}

impl CodeService {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }

    pub fn from_env() -> Self {
        let endpoint = std::env::var("CODE_ENDPOINT")
            .unwrap_or_else(|_| "https://api.qrserver.com/v1/create-qr-code/".to_string());
        Self::new(endpoint)
    }

    /// Fetch a `size`×`size` PNG rendering of the card's payload.
    pub async fn fetch_png(
        &self,
        http: &reqwest::Client,
        card: &ContactCard,
        size: u32,
    ) -> Result<Vec<u8>, BadgeError> {
        let payload = card.payload()?;
        let url = format!(
            "{}?size={size}x{size}&data={}",
            self.endpoint,
            urlencoding::encode(&payload)
        );

        let resp = http
            .get(&url)
            .send()
            .await
            .map_err(|e| BadgeError::Internal(format!("code service: {e}")))?;
        if !resp.status().is_success() {
            return Err(BadgeError::Internal(format!(
                "code service returned {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| BadgeError::Internal(format!("code service: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> ContactCard {
        ContactCard {
            first_name: "Somchai".into(),
            last_name: "Jaidee".into(),
            organization: "SNNP".into(),
            title: "10001".into(),
            url: "snnp.co.th".into(),
        }
    }

    #[test]
    fn payload_is_exact_and_deterministic() {
        let expected = "BEGIN:VCARD\nVERSION:3.0\nN:Jaidee;Somchai\nFN:Somchai Jaidee\nORG:SNNP\nTITLE:10001\nURL:snnp.co.th\nEND:VCARD";
        assert_eq!(card().payload().unwrap(), expected);
        assert_eq!(card().payload().unwrap(), card().payload().unwrap());
    }

    #[test]
    fn payload_round_trips_through_a_vcard_parser() {
        let payload = card().payload().unwrap();

        // minimal line-oriented vCard reader
        let mut n = None;
        let mut org = None;
        let mut title = None;
        let mut url = None;
        for line in payload.lines() {
            let (key, value) = line.split_once(':').unwrap();
            match key {
                "N" => n = Some(value.to_string()),
                "ORG" => org = Some(value.to_string()),
                "TITLE" => title = Some(value.to_string()),
                "URL" => url = Some(value.to_string()),
                _ => {}
            }
        }

        let (last, first) = n.unwrap().split_once(';').map(|(a, b)| (a.to_string(), b.to_string())).unwrap();
        assert_eq!(first, card().first_name);
        assert_eq!(last, card().last_name);
        assert_eq!(org.unwrap(), card().organization);
        assert_eq!(title.unwrap(), card().title);
        assert_eq!(url.unwrap(), card().url);
        assert_eq!(payload.lines().next().unwrap(), "BEGIN:VCARD");
        assert_eq!(payload.lines().last().unwrap(), "END:VCARD");
    }

    #[test]
    fn line_breaks_in_fields_are_rejected() {
        let mut c = card();
        c.organization = "SN\nNP".into();
        assert!(matches!(c.payload(), Err(BadgeError::Encoding(_))));

        let mut c = card();
        c.first_name = "Som\rchai".into();
        assert!(matches!(c.payload(), Err(BadgeError::Encoding(_))));
    }

    #[test]
    fn record_defaults_flow_into_the_card() {
        let record = BadgeRecord {
            en_firstname: Some("Somchai".into()),
            en_lastname: Some("Jaidee".into()),
            emp_id: Some(10001),
            ..Default::default()
        };
        let c = ContactCard::from_record(&record);
        assert_eq!(c.organization, "SNNP");
        assert_eq!(c.url, "snnp.co.th");
        assert_eq!(c.title, "10001");
    }
}
