//! Error taxonomy shared by every Castline crate.

use thiserror::Error;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, CastlineError>;

#[derive(Debug, Error)]
pub enum CastlineError {
    /// Input could not be normalized into a canonical number.
    #[error("invalid phone number: {0}")]
    InvalidNumber(String),

    /// Sender is not an authorized operator.
    #[error("unauthorized sender: {0}")]
    Unauthorized(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A command was issued without its required argument.
    #[error("missing argument, usage: {0}")]
    MissingArgument(String),

    /// Per-recipient channel failure.
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("recipient directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// The messaging session is not ready, failed or disconnected.
    #[error("session error: {0}")]
    Session(String),

    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    /// Another broadcast is already running against the channel.
    #[error("a broadcast is already in progress")]
    Busy,

    /// A fan-out verb was triggered from inside a running broadcast item.
    #[error("nested broadcast rejected: {0}")]
    NestedBroadcast(String),

    #[error("no recipients available")]
    NoRecipients,

    #[error("shutdown in progress")]
    ShuttingDown,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CastlineError {
    /// Human-readable cause suitable for a reply message or an HTTP error body.
    /// Internal faults are collapsed into a generic text.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidNumber(input) => format!("Número inválido: {input}"),
            Self::Unauthorized(_) => "Acceso denegado".into(),
            Self::UnknownCommand(verb) => format!("Comando no reconocido: {verb}"),
            Self::MissingArgument(usage) => format!("Formato: {usage}"),
            Self::Delivery(_) => "No se pudo entregar el mensaje".into(),
            Self::DirectoryUnavailable(_) => "Directorio de clientes no disponible".into(),
            Self::Session(_) => "Sesión de WhatsApp no disponible".into(),
            Self::Timeout(_) => "Tiempo de espera agotado".into(),
            Self::Busy => "Ya hay un envío masivo en curso, intente más tarde".into(),
            Self::NestedBroadcast(verb) => {
                format!("El comando {verb} no puede usarse dentro de un envío masivo")
            }
            Self::NoRecipients => "No hay destinatarios disponibles".into(),
            Self::ShuttingDown => "El servicio se está deteniendo".into(),
            Self::Config(_) | Self::Io(_) | Self::Json(_) => "Error interno".into(),
        }
    }

    /// Whether this error was caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidNumber(_)
                | Self::UnknownCommand(_)
                | Self::MissingArgument(_)
                | Self::NestedBroadcast(_)
                | Self::Unauthorized(_)
        )
    }
}
