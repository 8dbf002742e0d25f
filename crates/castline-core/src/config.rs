//! Castline configuration system.
//!
//! Loaded from TOML (`~/.castline/config.toml` by default), then overridden
//! by environment variables so deployments can keep secrets out of the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CastlineError, Result};
use crate::phone::NumberingPlan;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CastlineConfig {
    #[serde(default)]
    pub operators: OperatorsConfig,
    #[serde(default)]
    pub numbering: NumberingPlan,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
}

impl CastlineConfig {
    /// Load config from the default path, falling back to defaults if absent.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CastlineError::Config(format!("Failed to read config: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| CastlineError::Config(format!("Failed to parse config: {e}")))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Castline home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".castline")
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides using `lookup` as the variable source.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(list) = lookup("AUTHORIZED_NUMBERS") {
            self.operators.numbers = list
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
        }
        if let Some(v) = lookup("MAX_DELAY") {
            self.dispatch.max_delay_ms = v
                .trim()
                .parse()
                .map_err(|e| CastlineError::Config(format!("MAX_DELAY must be milliseconds: {e}")))?;
        }
        if let Some(v) = lookup("WISPHUB_API") {
            self.directory.endpoint = Some(v);
        }
        if let Some(v) = lookup("WISPHUB_API_KEY") {
            self.directory.api_key = v;
        }
        if let Some(v) = lookup("PORT") {
            self.gateway.port = v
                .trim()
                .parse()
                .map_err(|e| CastlineError::Config(format!("PORT must be a port number: {e}")))?;
        }
        if let Some(v) = lookup("CASTLINE_API_KEY") {
            self.gateway.api_key = Some(v);
        }
        if let Some(v) = lookup("WHATSAPP_ACCESS_TOKEN") {
            self.whatsapp.access_token = v;
        }
        if let Some(v) = lookup("WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = v;
        }
        if let Some(v) = lookup("WHATSAPP_VERIFY_TOKEN") {
            self.whatsapp.webhook_verify_token = v;
        }
        if let Some(v) = lookup("WHATSAPP_APP_SECRET") {
            self.whatsapp.app_secret = v;
        }
        Ok(())
    }

    /// Canonicalize the configured operator numbers.
    /// An operator that cannot be canonicalized is a configuration error.
    pub fn canonical_operators(&self) -> Result<Vec<String>> {
        self.operators
            .numbers
            .iter()
            .map(|raw| {
                self.numbering.canonicalize(raw).map_err(|_| {
                    CastlineError::Config(format!("Invalid authorized operator number: {raw}"))
                })
            })
            .collect()
    }
}

/// Authorized operators allowed to issue commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorsConfig {
    #[serde(default = "default_operators")]
    pub numbers: Vec<String>,
}

fn default_operators() -> Vec<String> {
    vec!["5492664031203".into(), "5492664298513".into()]
}

impl Default for OperatorsConfig {
    fn default() -> Self {
        Self {
            numbers: default_operators(),
        }
    }
}

/// Broadcast pacing and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Ceiling of the progressive inter-item delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Batches up to this size are sent back-to-back.
    #[serde(default = "default_fast_path_limit")]
    pub fast_path_limit: usize,
    /// Timeout for a single gateway send.
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    /// Timeout for a whole dispatch item (a command item may issue several sends).
    #[serde(default = "default_item_timeout_ms")]
    pub item_timeout_ms: u64,
}

fn default_max_delay_ms() -> u64 { 10_000 }
fn default_fast_path_limit() -> usize { 3 }
fn default_delivery_timeout_ms() -> u64 { 5_000 }
fn default_item_timeout_ms() -> u64 { 15_000 }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_delay_ms: default_max_delay_ms(),
            fast_path_limit: default_fast_path_limit(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            item_timeout_ms: default_item_timeout_ms(),
        }
    }
}

/// External customer directory. Disabled when `endpoint` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_directory_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_directory_timeout_ms() -> u64 { 5_000 }

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: String::new(),
            timeout_ms: default_directory_timeout_ms(),
        }
    }
}

/// HTTP control surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Required `X-Api-Key` for `/send`; open when unset.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 5000 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
        }
    }
}

/// WhatsApp Business Cloud API credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Facebook Graph API access token
    #[serde(default)]
    pub access_token: String,
    /// WhatsApp Phone Number ID
    #[serde(default)]
    pub phone_number_id: String,
    /// Webhook verify token (for incoming messages)
    #[serde(default)]
    pub webhook_verify_token: String,
    /// Meta app secret; keys the `X-Hub-Signature-256` check on inbound webhooks.
    /// Inbound webhooks are refused while this is empty.
    #[serde(default)]
    pub app_secret: String,
    #[serde(default = "default_graph_api_base")]
    pub api_base: String,
}

fn default_graph_api_base() -> String { "https://graph.facebook.com/v21.0".into() }

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            webhook_verify_token: String::new(),
            app_secret: String::new(),
            api_base: default_graph_api_base(),
        }
    }
}

/// Recipient store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: String,
}

fn default_registry_path() -> String { "~/.castline/recipients.json".into() }

impl RegistryConfig {
    pub fn expanded_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

/// Command syntax and fixed announcements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_marker")]
    pub marker: char,
    #[serde(default = "default_separator")]
    pub separator: char,
    /// Header prepended to every broadcast payload.
    #[serde(default = "default_broadcast_prefix")]
    pub broadcast_prefix: String,
    #[serde(default = "default_alerts")]
    pub alerts: Vec<AlertConfig>,
}

fn default_marker() -> char { '!' }
fn default_separator() -> char { ':' }
fn default_broadcast_prefix() -> String { "🔔 Notificación PuntoNet:\n".into() }

fn default_alerts() -> Vec<AlertConfig> {
    vec![
        AlertConfig {
            verb: "tormenta".into(),
            description: "Alerta meteorológica".into(),
            image_path: Some("imagenes/tormenta.jpg".into()),
            caption: "*Aviso Importante de PuntoNet*\n\nEstimados clientes,\n\nDebido a la presencia de descargas atmosféricas, les recomendamos desconectar sus equipos de internet para evitar posibles daños.\n\nSaludos,\n*Equipo PuntoNet*".into(),
        },
        AlertConfig {
            verb: "cambios".into(),
            description: "Novedades del servicio".into(),
            image_path: Some("imagenes/2025.jpg".into()),
            caption: "¡Feliz Año Nuevo! 🎆\nComienza el 2025 conectado con PuntoNet.\n\nNuevas velocidades disponibles desde el 01/01.".into(),
        },
    ]
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            separator: default_separator(),
            broadcast_prefix: default_broadcast_prefix(),
            alerts: default_alerts(),
        }
    }
}

/// A fixed announcement bound to a verb.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub verb: String,
    #[serde(default)]
    pub description: String,
    /// Image sent with the caption; text-only when missing or unreadable.
    #[serde(default)]
    pub image_path: Option<String>,
    pub caption: String,
}
