use clap::{Args, Subcommand};
use std::io::{self, Write};

use super::{OutputFormat, Remote};
use sportswap::remote::Session;
use sportswap::resource::settle;

#[derive(Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

#[derive(Subcommand)]
pub enum AuthSubcommand {
    /// Create an account and sign in
    Register {
        /// Email address
        #[arg(long)]
        email: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Password (prompted for if omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign in with email and password
    Login {
        /// Email address
        #[arg(long)]
        email: String,

        /// Password (prompted for if omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign in with a Google ID token
    Google {
        /// ID token issued by Google Sign-In
        #[arg(long)]
        id_token: String,
    },

    /// Sign out
    Logout,

    /// Show the signed-in account
    Whoami {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl AuthCommand {
    pub async fn run(&self, remote: &Remote) -> Result<(), Box<dyn std::error::Error>> {
        let auth = &remote.auth;
        match &self.command {
            AuthSubcommand::Register {
                email,
                name,
                password,
            } => {
                if name.trim().is_empty() {
                    return Err("Name cannot be empty".into());
                }
                let password = password_or_prompt(password.as_deref())?;
                let session = settle(auth.register(email.trim(), &password, name.trim())).await?;
                println!("Registered and signed in as {}", describe(&session));
                Ok(())
            }

            AuthSubcommand::Login { email, password } => {
                let password = password_or_prompt(password.as_deref())?;
                let session = settle(auth.login(email.trim(), &password)).await?;
                println!("Signed in as {}", describe(&session));
                Ok(())
            }

            AuthSubcommand::Google { id_token } => {
                let session = settle(auth.sign_in_with_google(id_token.trim())).await?;
                println!("Signed in as {}", describe(&session));
                Ok(())
            }

            AuthSubcommand::Logout => {
                auth.sign_out().await?;
                println!("Signed out");
                Ok(())
            }

            AuthSubcommand::Whoami { format } => {
                let Some(session) = auth.current_session() else {
                    println!("Not signed in");
                    return Ok(());
                };
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&session)?);
                    }
                    OutputFormat::Text => {
                        println!("User ID: {}", session.user_id);
                        if let Some(email) = &session.email {
                            println!("Email:   {}", email);
                        }
                        if let Some(name) = &session.display_name {
                            println!("Name:    {}", name);
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

fn describe(session: &Session) -> String {
    match (&session.display_name, &session.email) {
        (Some(name), _) => format!("{} ({})", name, session.user_id),
        (None, Some(email)) => format!("{} ({})", email, session.user_id),
        (None, None) => session.user_id.clone(),
    }
}

fn password_or_prompt(password: Option<&str>) -> Result<String, io::Error> {
    if let Some(password) = password {
        return Ok(password.to_string());
    }
    print!("Password: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}
