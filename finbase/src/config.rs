use std::fs;

use anyhow::{Context, anyhow};
use camino::Utf8PathBuf;
use clap::Args;
use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:54321";
pub const DEFAULT_REDIRECT_URL: &str = "http://localhost:8501";

#[derive(Args, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Config {
    /// Base URL of the hosted backend
    #[arg(long, env = "SUPABASE_URL")]
    api_url: Option<String>,
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    anon_key: Option<String>,
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    service_role_key: Option<String>,
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
    /// Older name for `DATABASE_URL`
    #[arg(long, env = "DB_URL", hide = true, hide_env_values = true)]
    db_url: Option<String>,
    /// Where sign-in links and OAuth providers send the browser back to
    #[arg(long, env = "PUBLIC_BASE_URL")]
    redirect_url: Option<String>,
    /// Emails allowed to run admin commands
    #[arg(long, env = "ADMIN_EMAILS", value_delimiter = ',')]
    admin_emails: Vec<String>,
    /// TOML file holding any of the settings above
    #[arg(long, env = "FINBASE_SECRETS_FILE")]
    secrets_file: Option<Utf8PathBuf>,
    #[arg(long, env = "FINBASE_SESSION_FILE")]
    session_file: Option<Utf8PathBuf>,
}

#[derive(Deserialize, Default, Debug)]
struct SecretKeys {
    #[serde(rename = "SUPABASE_URL")]
    api_url: Option<String>,
    #[serde(rename = "SUPABASE_ANON_KEY")]
    anon_key: Option<String>,
    #[serde(rename = "SUPABASE_SERVICE_ROLE_KEY", alias = "SERVICE_ROLE_KEY")]
    service_role_key: Option<String>,
    #[serde(rename = "DATABASE_URL", alias = "DB_URL")]
    database_url: Option<String>,
    #[serde(rename = "PUBLIC_BASE_URL")]
    redirect_url: Option<String>,
    #[serde(rename = "ADMIN_EMAILS")]
    admin_emails: Option<EmailList>,
}

#[derive(Deserialize, Default, Debug)]
struct SupabaseTable {
    url: Option<String>,
    anon_key: Option<String>,
    service_role_key: Option<String>,
}

#[derive(Deserialize, Default, Debug)]
struct DatabaseTable {
    url: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum EmailList {
    Joined(String),
    List(Vec<String>),
}

impl EmailList {
    fn into_vec(self) -> Vec<String> {
        let emails = match self {
            Self::Joined(s) => s.split(',').map(str::to_string).collect(),
            Self::List(emails) => emails,
        };

        emails
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect()
    }
}

#[derive(Deserialize, Default, Debug)]
struct SecretsFile {
    #[serde(flatten)]
    flat: SecretKeys,
    #[serde(default)]
    env: SecretKeys,
    #[serde(default)]
    supabase: SupabaseTable,
    #[serde(default)]
    database: DatabaseTable,
}

impl Config {
    /// Fills every setting not given as a flag or environment variable from the secrets file.
    ///
    /// # Errors
    /// Fails when the secrets file cannot be read or is not valid TOML.
    pub fn read_secrets(&mut self) -> anyhow::Result<()> {
        let Some(path) = &self.secrets_file else {
            return Ok(());
        };

        let contents =
            fs::read_to_string(path).context(format!("failed to read secrets file {path}"))?;
        let SecretsFile {
            flat,
            env,
            supabase,
            database,
        } = toml::from_str(&contents).context(format!("failed to parse secrets file {path}"))?;

        let Self {
            api_url,
            anon_key,
            service_role_key,
            database_url,
            db_url,
            redirect_url,
            admin_emails,
            ..
        } = self;

        fn fill(slot: &mut Option<String>, candidates: [Option<String>; 3]) {
            if slot.is_none() {
                *slot = candidates.into_iter().flatten().find(|s| !s.trim().is_empty());
            }
        }

        fill(api_url, [flat.api_url, env.api_url, supabase.url]);
        fill(anon_key, [flat.anon_key, env.anon_key, supabase.anon_key]);
        fill(
            service_role_key,
            [
                flat.service_role_key,
                env.service_role_key,
                supabase.service_role_key,
            ],
        );
        if db_url.is_none() {
            fill(
                database_url,
                [flat.database_url, env.database_url, database.url],
            );
        }
        fill(redirect_url, [flat.redirect_url, env.redirect_url, None]);

        if admin_emails.is_empty() {
            *admin_emails = flat
                .admin_emails
                .or(env.admin_emails)
                .map(EmailList::into_vec)
                .unwrap_or_default();
        }

        Ok(())
    }

    #[must_use]
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
    }

    /// # Errors
    pub fn anon_key(&self) -> anyhow::Result<&str> {
        required(self.anon_key.as_deref(), "SUPABASE_ANON_KEY")
    }

    /// # Errors
    pub fn service_role_key(&self) -> anyhow::Result<&str> {
        required(
            self.service_role_key.as_deref(),
            "SUPABASE_SERVICE_ROLE_KEY",
        )
    }

    /// # Errors
    pub fn database_url(&self) -> anyhow::Result<&str> {
        required(
            self.database_url.as_deref().or(self.db_url.as_deref()),
            "DATABASE_URL",
        )
    }

    #[must_use]
    pub fn redirect_url(&self) -> &str {
        self.redirect_url
            .as_deref()
            .unwrap_or(DEFAULT_REDIRECT_URL)
            .trim_end_matches('/')
    }

    #[must_use]
    pub fn admin_emails(&self) -> &[String] {
        &self.admin_emails
    }

    /// # Errors
    /// Fails when no session file is configured and the platform has no config directory.
    pub fn session_file(&self) -> anyhow::Result<Utf8PathBuf> {
        if let Some(path) = &self.session_file {
            return Ok(path.clone());
        }

        let config_dir =
            dirs::config_dir().context("no configuration directory on this platform")?;
        let config_dir = Utf8PathBuf::try_from(config_dir)
            .context("configuration directory is not valid UTF-8")?;

        Ok(config_dir.join("finbase").join("auth.json"))
    }
}

fn required<'a>(value: Option<&'a str>, key: &str) -> anyhow::Result<&'a str> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("missing {key}"))
}
