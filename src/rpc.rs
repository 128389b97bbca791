//! RPC operations. Each operation has a fixed [`Tier`]; the dispatcher runs
//! [`gate::authorize`](crate::auth::gate::authorize) before calling [`execute`].

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::auth::Principal;
use crate::auth::gate::{Access, Tier};
use crate::error::{AppError, ErrorKind};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Login,
    Detail,
    SendVerificationEmail,
    IsTokenValid,
    VerifyEmail,
    SendForgotPasswordEmail,
    UpdatePassword,
    ChangePassword,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Register,
        Operation::Login,
        Operation::Detail,
        Operation::SendVerificationEmail,
        Operation::IsTokenValid,
        Operation::VerifyEmail,
        Operation::SendForgotPasswordEmail,
        Operation::UpdatePassword,
        Operation::ChangePassword,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Register => "register",
            Operation::Login => "login",
            Operation::Detail => "detail",
            Operation::SendVerificationEmail => "sendVerificationEmail",
            Operation::IsTokenValid => "isTokenValid",
            Operation::VerifyEmail => "verifyEmail",
            Operation::SendForgotPasswordEmail => "sendForgotPasswordEmail",
            Operation::UpdatePassword => "updatePassword",
            Operation::ChangePassword => "changePassword",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn tier(self) -> Tier {
        match self {
            Operation::Register
            | Operation::Login
            | Operation::IsTokenValid
            | Operation::VerifyEmail
            | Operation::SendForgotPasswordEmail
            | Operation::UpdatePassword => Tier::Public,
            Operation::Detail | Operation::ChangePassword => Tier::Protected,
            Operation::SendVerificationEmail => Tier::Admin,
        }
    }
}

#[derive(Deserialize)]
pub struct CredentialsInput {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct EmailInput {
    pub email: String,
}

#[derive(Deserialize)]
pub struct TokenInput {
    pub token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordInput {
    pub token: String,
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    pub old_password: String,
    pub new_password: String,
}

/// Result of an operation. `session` is set when the caller just logged in.
#[derive(Debug)]
pub struct Outcome {
    pub result: Value,
    pub session: Option<String>,
}

impl Outcome {
    fn of(result: Value) -> Self {
        Self {
            result,
            session: None,
        }
    }

    fn ok() -> Self {
        Self::of(json!("OK"))
    }
}

fn parse<T: DeserializeOwned>(input: Value) -> Result<T, AppError> {
    serde_json::from_value(input).map_err(|e| AppError::BadRequest(format!("Invalid input: {e}")))
}

pub async fn execute(
    state: &AppState,
    op: Operation,
    access: Access,
    input: Value,
) -> Result<Outcome, AppError> {
    let accounts = &state.accounts;

    match op {
        Operation::Register => {
            let input: CredentialsInput = parse(input)?;
            accounts.register(&input.email, &input.password).await?;
            Ok(Outcome::of(json!("Account created")))
        }
        Operation::Login => login(state, parse(input)?).await,
        Operation::Detail => {
            let user = accounts.detail(access.principal()?).await?;
            Ok(Outcome::of(json!(user)))
        }
        Operation::SendVerificationEmail => {
            let input: EmailInput = parse(input)?;
            accounts.send_verification_email(&input.email).await?;
            Ok(Outcome::ok())
        }
        Operation::IsTokenValid => {
            let input: TokenInput = parse(input)?;
            let valid = accounts.is_token_valid(&input.token).await?;
            Ok(Outcome::of(json!({ "valid": valid, "expired": !valid })))
        }
        Operation::VerifyEmail => {
            let input: TokenInput = parse(input)?;
            accounts.verify_email(&input.token).await?;
            Ok(Outcome::ok())
        }
        Operation::SendForgotPasswordEmail => {
            let input: EmailInput = parse(input)?;
            accounts.send_forgot_password_email(&input.email).await?;
            Ok(Outcome::ok())
        }
        Operation::UpdatePassword => {
            let input: UpdatePasswordInput = parse(input)?;
            accounts
                .reset_password(&input.token, &input.new_password)
                .await?;
            Ok(Outcome::ok())
        }
        Operation::ChangePassword => {
            let input: ChangePasswordInput = parse(input)?;
            accounts
                .change_password(access.principal()?, &input.old_password, &input.new_password)
                .await?;
            Ok(Outcome::ok())
        }
    }
}

async fn login(state: &AppState, input: CredentialsInput) -> Result<Outcome, AppError> {
    let limiter = &state.login_limiter;
    if let Err(retry_after) = limiter.acquire(&input.email) {
        let minutes = retry_after.as_secs().div_ceil(60).max(1);
        return Err(AppError::RateLimited(format!(
            "Too many login attempts. Try again in {minutes} minutes."
        )));
    }

    let user = match state
        .accounts
        .authenticate(&input.email, &input.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            // Bad credentials keep the reserved attempt
            if e.kind() != ErrorKind::Unauthorized {
                limiter.release(&input.email);
            }
            return Err(e);
        }
    };
    limiter.reset(&input.email);

    let principal = Principal {
        id: user.id,
        role: user.role,
    };
    let session = state
        .sessions
        .issue(&principal)
        .map_err(AppError::Internal)?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Outcome {
        result: json!({ "token": session, "user": principal }),
        session: Some(session),
    })
}
