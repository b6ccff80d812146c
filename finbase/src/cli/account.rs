use anyhow::bail;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use dialoguer::{Input, Password};
use itertools::Itertools;
use serde::Serialize;
use uuid::Uuid;

use super::print_rows;
use crate::{
    auth::{
        Authenticator, CallbackListener, Credentials, OAuthProvider, OtpKind, RedirectTokens,
        Session, User, jwt, parse_redirect,
    },
    config::Config,
    export::Format,
};

#[derive(Subcommand, Debug)]
pub enum LoginCommand {
    /// Email and password
    Password {
        #[arg(long)]
        email: String,
    },
    /// Email a sign-in link and wait for the browser to come back
    MagicLink {
        #[arg(long)]
        email: String,
    },
    /// Verify a one-time code from a sign-in email
    Otp {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        code: Option<String>,
        #[arg(long, default_value = "email")]
        kind: OtpKind,
    },
    /// Sign in with an identity provider in the browser
    Oauth {
        #[arg(long, default_value = "google")]
        provider: OAuthProvider,
    },
    /// Finish a sign-in from a link copied out of the browser
    Callback { url: String },
}

fn session_from(RedirectTokens { grant, kind }: RedirectTokens) -> (Session, bool) {
    let is_recovery = kind.as_deref() == Some("recovery");

    (Session::from_grant(grant, None, Utc::now()), is_recovery)
}

fn prompt_new_password() -> anyhow::Result<String> {
    Ok(Password::new()
        .with_prompt("New password")
        .with_confirmation("Repeat password", "Passwords do not match")
        .interact()?)
}

pub(super) async fn login(
    command: LoginCommand,
    auth: &Authenticator,
    redirect_url: &str,
) -> anyhow::Result<()> {
    let client = auth.auth_client();

    let (session, is_recovery) = match command {
        LoginCommand::Password { email } => {
            let password = Password::new().with_prompt("Password").interact()?;
            let session = client
                .sign_in_with_password(&Credentials::new(&email, &password))
                .await?;
            (session, false)
        }
        LoginCommand::MagicLink { email } => {
            let listener = CallbackListener::bind(redirect_url).await?;
            client.send_magic_link(&email, listener.redirect_url()).await?;
            eprintln!("Sign-in link sent to {email}. Open it in a browser on this machine.");

            session_from(listener.wait_for_tokens().await?)
        }
        LoginCommand::Otp { email, code, kind } => {
            let code = match code {
                Some(code) => code,
                None => Input::<String>::new()
                    .with_prompt("Code from the email")
                    .interact_text()?,
            };
            let session = client.verify_otp(&email, code.trim(), kind).await?;
            (session, kind == OtpKind::Recovery)
        }
        LoginCommand::Oauth { provider } => {
            let listener = CallbackListener::bind(redirect_url).await?;
            let url = client.oauth_url(provider, listener.redirect_url())?;
            eprintln!("Open this URL in a browser to sign in with {provider}:\n\n    {url}\n");

            session_from(listener.wait_for_tokens().await?)
        }
        LoginCommand::Callback { url } => session_from(parse_redirect(&url)?),
    };

    let user = auth.sign_in(session).await?;
    println!("Signed in as {}", user.email_or_id());

    // A password-reset link signs the user in; the new password is set right away.
    if is_recovery {
        let password = prompt_new_password()?;
        auth.change_password(&password).await?;
        println!("Password changed");
    }

    Ok(())
}

pub(super) async fn logout(auth: &Authenticator) -> anyhow::Result<()> {
    auth.sign_out().await?;
    println!("Signed out");

    Ok(())
}

#[derive(Serialize)]
struct Whoami {
    id: Uuid,
    email: Option<String>,
    role: Option<String>,
    admin: bool,
    session_expires_at: Option<DateTime<Utc>>,
}

pub(super) async fn whoami(auth: &Authenticator, format: Format) -> anyhow::Result<()> {
    let (_, user) = auth.authenticate().await?;
    let admin = auth.require_admin(&user).is_ok();
    let session_expires_at = auth
        .store()
        .load()
        .and_then(|s| DateTime::from_timestamp(s.expires_at, 0));

    let row = Whoami {
        id: user.id,
        email: user.email,
        role: user.role,
        admin,
        session_expires_at,
    };

    print_rows(&[row], format)
}

pub(super) async fn reset_password(
    auth: &Authenticator,
    email: &str,
    redirect_url: &str,
) -> anyhow::Result<()> {
    auth.auth_client()
        .send_password_reset(email, redirect_url)
        .await?;

    println!(
        "If {email} has an account, a reset link is on its way. Open it, then pass the address \
         it lands on to `finbase login callback`."
    );

    Ok(())
}

pub(super) async fn change_password(auth: &Authenticator) -> anyhow::Result<()> {
    let password = prompt_new_password()?;
    let user = auth.change_password(&password).await?;
    println!("Password changed for {}", user.email_or_id());

    Ok(())
}

pub(super) async fn doctor(config: &Config) -> anyhow::Result<()> {
    let mut problems = Vec::new();
    println!("API: {}", config.api_url());

    match config.anon_key() {
        Ok(anon_key) => problems.extend(jwt::anon_key_problems(anon_key, config.api_url())),
        Err(err) => problems.push(err.to_string()),
    }

    if config.service_role_key().is_err() {
        println!("no service-role key; `finbase admin set-password` is unavailable");
    }
    if config.database_url().is_err() {
        println!("no database URL; schema and migration commands are unavailable");
    }

    if let Ok(auth) = Authenticator::from_config(config) {
        match auth.auth_client().settings().await {
            Ok(settings) => {
                println!(
                    "auth API reachable; providers: {}",
                    settings.enabled_providers().join(", ")
                );
                if !settings.disable_signup {
                    println!("open sign-up is enabled; accounts are normally created by an admin");
                }
            }
            Err(err) => problems.push(format!("auth API unreachable: {err}")),
        }

        match auth.store().load() {
            Some(session) => {
                let user = session
                    .user
                    .as_ref()
                    .map_or_else(|| "unknown user".to_string(), User::email_or_id);
                let minutes = session.expires_in(Utc::now()).num_minutes();
                println!(
                    "session for {user} stored in {}, expires in {minutes} min",
                    auth.store().path()
                );
            }
            None => println!("not signed in"),
        }
    }

    if problems.is_empty() {
        println!("no problems found");
        return Ok(());
    }

    for problem in &problems {
        println!("problem: {problem}");
    }
    bail!("{} problem(s) found", problems.len())
}
