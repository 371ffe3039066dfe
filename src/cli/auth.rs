use super::{CommandContext, OutputFormat};
use anyhow::Result;
use inquire::Password;
use inquire::validator::Validation;

use moviehub::models::{ProfileUpdate, RegisterData};

pub enum AuthCommand {
    Login {
        email: String,
        password: Option<String>,
    },
    Register {
        email: String,
        password: Option<String>,
        confirm_password: Option<String>,
    },
    Logout,
    WhoAmI,
    ForgotPassword {
        email: String,
    },
    ResetPassword {
        token: String,
        password: Option<String>,
    },
    Verify {
        email: String,
        token: String,
    },
    UpdateProfile {
        username: Option<String>,
        email: Option<String>,
        avatar: Option<String>,
    },
}

impl AuthCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        match self {
            Self::Login { email, password } => {
                let password = match password {
                    Some(p) => p,
                    None => prompt_password("Password:")?,
                };

                if !context.hub.sessions.login(&email, &password).await {
                    anyhow::bail!("Invalid email or password");
                }

                let session = context.hub.sessions.current();
                match context.format {
                    OutputFormat::Json => context.print_json(&session)?,
                    OutputFormat::Text => {
                        if let Some(session) = session {
                            println!(
                                "Signed in as {} ({})",
                                display_name(&session.user.username, &session.user.email),
                                session.role()
                            );
                        }
                    }
                }
            }

            Self::Register {
                email,
                password,
                confirm_password,
            } => {
                let password = match password {
                    Some(p) => p,
                    None => prompt_new_password()?,
                };
                let confirm = confirm_password.unwrap_or_else(|| password.clone());
                let data = RegisterData::new(email.clone(), password).with_confirmation(confirm);

                if let Err(reason) = data.validate() {
                    anyhow::bail!(reason);
                }
                if !context.hub.sessions.register(&data).await {
                    anyhow::bail!("Registration failed for {}", email);
                }
                println!(
                    "Account created. Check {} for a verification link before signing in.",
                    email
                );
            }

            Self::Logout => {
                context.hub.sessions.logout().await;
                context.hub.forget_credentials()?;
                println!("Signed out");
            }

            Self::WhoAmI => {
                let session = context.require_session().await?;
                match context.format {
                    OutputFormat::Json => context.print_json(&session)?,
                    OutputFormat::Text => {
                        println!("ID: {}", session.id());
                        println!("Email: {}", session.user.email);
                        if !session.user.username.is_empty() {
                            println!("Username: {}", session.user.username);
                        }
                        println!("Role: {}", session.role());
                        if let Some(created) = session.user.created_at {
                            println!("Member since: {}", created.format("%Y-%m-%d"));
                        }
                        if let Some(last_login) = session.last_login {
                            println!("Last login: {}", last_login.format("%Y-%m-%d %H:%M UTC"));
                        }
                    }
                }
            }

            Self::ForgotPassword { email } => {
                context.hub.api.forgot_password(&email).await?;
                println!("If {} has an account, a reset link is on its way.", email);
            }

            Self::ResetPassword { token, password } => {
                let password = match password {
                    Some(p) => p,
                    None => prompt_new_password()?,
                };
                context.hub.api.reset_password(&token, &password).await?;
                println!("Password updated. You can now sign in.");
            }

            Self::Verify { email, token } => {
                let response = context.hub.api.verify_email(&email, &token).await?;
                match context.format {
                    OutputFormat::Json => context.print_json(&response)?,
                    OutputFormat::Text => {
                        println!("Email {} verified. You can now sign in.", email);
                    }
                }
            }

            Self::UpdateProfile {
                username,
                email,
                avatar,
            } => {
                if username.is_none() && email.is_none() && avatar.is_none() {
                    anyhow::bail!("Nothing to update. Pass --username, --email or --avatar.");
                }
                let session = context.require_session().await?;
                let update = ProfileUpdate {
                    username,
                    email,
                    avatar,
                };
                let user = context.hub.api.update_profile(session.id(), &update).await?;
                match context.format {
                    OutputFormat::Json => context.print_json(&user)?,
                    OutputFormat::Text => {
                        println!(
                            "Profile updated for {}",
                            display_name(&user.username, &user.email)
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

fn display_name<'a>(username: &'a str, email: &'a str) -> &'a str {
    if username.is_empty() { email } else { username }
}

fn prompt_password(message: &str) -> Result<String> {
    let password = Password::new(message)
        .without_confirmation()
        .with_validator(|input: &str| {
            if input.is_empty() {
                Ok(Validation::Invalid("Password is required".into()))
            } else {
                Ok(Validation::Valid)
            }
        })
        .prompt()?;
    Ok(password)
}

fn prompt_new_password() -> Result<String> {
    let password = Password::new("New password:")
        .with_custom_confirmation_message("Confirm password:")
        .with_custom_confirmation_error_message("Passwords do not match")
        .prompt()?;
    Ok(password)
}

