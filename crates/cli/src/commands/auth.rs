use std::io::{BufRead, Write};

use clap::Args;
use divemedia_ops::OpsClient;
use divemedia_core::Session;
use zeroize::Zeroizing;

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email.
    #[arg(required_unless_present = "oauth")]
    pub email: Option<String>,
    /// Password. Read from stdin when omitted.
    #[arg(long, env = "DIVEMEDIA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Print the sign-in URL for an OAuth provider (e.g. `google`) instead.
    #[arg(long, conflicts_with = "email")]
    pub oauth: Option<String>,
    /// Where the auth service redirects after OAuth sign-in.
    #[arg(long, default_value = "http://localhost:3000/")]
    pub redirect_to: String,
}

fn read_password() -> anyhow::Result<Zeroizing<String>> {
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = Zeroizing::new(String::new());
    std::io::stdin().lock().read_line(&mut line)?;
    let trimmed = Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_owned());
    Ok(trimmed)
}

pub async fn login(ops: &OpsClient, args: &LoginArgs, format: &OutputFormat) -> anyhow::Result<()> {
    if let Some(provider) = &args.oauth {
        let url = ops.oauth_url(provider, &args.redirect_to)?;
        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "url": url }));
            }
            OutputFormat::Text => {
                println!("Open this URL to sign in with {provider}:");
                println!("  {url}");
            }
        }
        return Ok(());
    }

    let Some(email) = &args.email else {
        anyhow::bail!("an email is required");
    };
    let password = match &args.password {
        Some(p) => Zeroizing::new(p.clone()),
        None => read_password()?,
    };

    let session = ops.login(email, &password).await?;
    print_session(&session, format)?;
    Ok(())
}

pub async fn logout(ops: &OpsClient) -> anyhow::Result<()> {
    ops.logout().await?;
    println!("Signed out.");
    Ok(())
}

pub async fn whoami(ops: &OpsClient, format: &OutputFormat) -> anyhow::Result<()> {
    match ops.whoami().await {
        Some(session) => print_session(&session, format),
        None => {
            println!("Not signed in.");
            Ok(())
        }
    }
}

fn print_session(session: &Session, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            // Never print tokens.
            let user = serde_json::to_value(&session.user)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "user": user,
                    "expires_at": session.expires_at,
                }))?
            );
        }
        OutputFormat::Text => match &session.user {
            Some(user) => {
                println!("Signed in as {}", session.email().unwrap_or(&user.id));
                println!("  User ID: {}", user.id);
                if let Some(exp) = session.expires_at {
                    println!("  Expires: {exp}");
                }
            }
            None => println!("Using a pre-issued access token."),
        },
    }
    Ok(())
}
