use std::env;

use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Base URL of the hosted identity service.
    pub identity_url: String,
    pub identity_api_key: SecretString,
    /// Public storefront URL, used for hosted checkout return pages.
    pub site_url: String,
    /// Destination contact for WhatsApp checkout handoffs, digits only.
    pub whatsapp_number: String,
    pub currency: String,
    pub stripe_secret_key: Option<SecretString>,
    pub stripe_webhook_secret: Option<SecretString>,
    pub pagarme_webhook_token: Option<SecretString>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let identity_url = env::var("IDENTITY_URL")
            .map_err(|_| anyhow::anyhow!("IDENTITY_URL is not set"))?
            .trim_end_matches('/')
            .to_string();
        let identity_api_key = env::var("IDENTITY_API_KEY")
            .map(SecretString::from)
            .map_err(|_| anyhow::anyhow!("IDENTITY_API_KEY is not set"))?;
        let site_url = env::var("SITE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let whatsapp_number = env::var("WHATSAPP_NUMBER")
            .unwrap_or_else(|_| "5511999999999".to_string())
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        let currency = env::var("PAYMENT_CURRENCY")
            .map(|c| c.to_lowercase())
            .unwrap_or_else(|_| "brl".to_string());

        Ok(Self {
            port,
            database_url,
            host,
            identity_url,
            identity_api_key,
            site_url,
            whatsapp_number,
            currency,
            stripe_secret_key: optional_secret("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: optional_secret("STRIPE_WEBHOOK_SECRET"),
            pagarme_webhook_token: optional_secret("PAGARME_WEBHOOK_TOKEN"),
        })
    }
}

fn optional_secret(key: &str) -> Option<SecretString> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}
