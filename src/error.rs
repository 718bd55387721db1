use std::fmt;

use crate::routing::Route;

/// Which identifier a uniqueness scan rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Username,
    Email,
    Cnpj,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IdentifierKind::Username => "Nome de usuário",
            IdentifierKind::Email => "E-mail",
            IdentifierKind::Cnpj => "CNPJ",
        };
        f.write_str(label)
    }
}

/// Form-level validation failures, surfaced inline to the user
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("CPF inválido")]
    InvalidCpf,
    #[error("Número de telefone inválido")]
    InvalidPhone,
    #[error("E-mail inválido")]
    InvalidEmail,
    #[error("CNPJ inválido")]
    InvalidCnpj,
    #[error("Nome de usuário inválido")]
    InvalidUsername,
    #[error("A senha deve ter pelo menos {min} caracteres")]
    PasswordTooShort { min: usize },
    #[error("A duração do acesso deve ser maior que zero")]
    InvalidDuration,
}

/// Errors produced by the access domain (auth, grants, backend calls)
///
/// Display strings are the messages shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Usuário ou senha inválidos")]
    InvalidCredentials,

    #[error("Usuário não encontrado")]
    AccountNotFound,

    #[error("Seu acesso expirou. Renove para continuar")]
    AccountExpired,

    #[error("Sua conta está aguardando aprovação do administrador")]
    AccountPendingApproval,

    #[error("{kind} já está em uso: {value}")]
    DuplicateIdentifier { kind: IdentifierKind, value: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Muitas tentativas de login. Aguarde {retry_after_secs} segundos e tente novamente")]
    RateLimited { retry_after_secs: u64 },

    #[error("Serviço indisponível: {0}")]
    BackendUnavailable(String),
}

impl AccessError {
    /// Route the user should land on after this failure, if any
    pub fn redirect(&self) -> Option<Route> {
        match self {
            AccessError::AccountExpired => Some(Route::LoginExpired),
            AccessError::AccountNotFound
            | AccessError::AccountPendingApproval
            | AccessError::InvalidCredentials => Some(Route::Login),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for AccessError {
    fn from(err: anyhow::Error) -> Self {
        AccessError::BackendUnavailable(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_account_redirects_to_renewal_login() {
        assert_eq!(AccessError::AccountExpired.redirect(), Some(Route::LoginExpired));
    }

    #[test]
    fn backend_errors_have_no_redirect() {
        let err = AccessError::BackendUnavailable("timeout".to_string());
        assert_eq!(err.redirect(), None);
        assert_eq!(err.to_string(), "Serviço indisponível: timeout");
    }

    #[test]
    fn validation_errors_display_transparently() {
        let err: AccessError = ValidationError::InvalidCpf.into();
        assert_eq!(err.to_string(), "CPF inválido");
    }

    #[test]
    fn duplicate_identifier_names_the_kind() {
        let err = AccessError::DuplicateIdentifier {
            kind: IdentifierKind::Username,
            value: "maria".to_string(),
        };
        assert_eq!(err.to_string(), "Nome de usuário já está em uso: maria");
    }
}
