use crate::error::Result;
use crate::models::game::GamePayload;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

pub const DEFAULT_DIFFICULTY_TARGET: i64 = 700;

fn default_difficulty_target() -> i64 {
    DEFAULT_DIFFICULTY_TARGET
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct GenerateGameRequest {
    /// Requested overall difficulty, 400-1000.
    #[serde(default = "default_difficulty_target")]
    #[validate(range(min = 400, max = 1000))]
    #[schema(minimum = 400, maximum = 1000, default = 700)]
    pub difficulty_target: i64,
}

impl Default for GenerateGameRequest {
    fn default() -> Self {
        Self {
            difficulty_target: DEFAULT_DIFFICULTY_TARGET,
        }
    }
}

impl GenerateGameRequest {
    /// Parses and validates a raw request body. An empty body means defaults.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        let request = if body.iter().all(u8::is_ascii_whitespace) {
            Self::default()
        } else {
            serde_json::from_slice::<Self>(body)?
        };
        request.validate()?;
        Ok(request)
    }

    pub fn target(&self) -> u32 {
        self.difficulty_target.clamp(0, u32::MAX as i64) as u32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateGameResponse {
    pub status: String,
    pub game: GamePayload,
}

impl GenerateGameResponse {
    pub fn success(game: GamePayload) -> Self {
        Self {
            status: "success".to_string(),
            game,
        }
    }
}
