use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_ID, MAX_LAYERS, MAX_TITLE_LEN, MAX_USERNAME_LEN, MIN_ID, MIN_PASSWORD_LEN, SOUNDS,
};
use crate::error::ValidationError;
use crate::tags::RawTags;

/// Parse a post or user identity from its textual form.
///
/// Only plain decimal digits denoting a value in `[1, 2147483647]` are
/// accepted: no sign, no surrounding whitespace.
pub fn parse_id(raw: &str) -> Result<i32, ValidationError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidId(raw.to_string()));
    }
    let value: i64 = raw
        .parse()
        .map_err(|_| ValidationError::InvalidId(raw.to_string()))?;
    if !(MIN_ID..=MAX_ID).contains(&value) {
        return Err(ValidationError::InvalidId(raw.to_string()));
    }
    i32::try_from(value).map_err(|_| ValidationError::InvalidId(raw.to_string()))
}

/// Parse the listing offset. `None` or an empty string means "unpaged".
pub fn parse_offset(raw: Option<&str>) -> Result<Option<u32>, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ValidationError::InvalidOffset(s.to_string())),
    }
}

/// Optional display properties embedded in a symbol art file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetProperties {
    /// Name stored inside the asset itself.
    pub name: Option<String>,
    /// Index into [`SOUNDS`].
    pub sound: Option<u32>,
    pub layers: Option<u32>,
}

impl AssetProperties {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(sound) = self.sound {
            if sound as usize >= SOUNDS.len() {
                return Err(ValidationError::UnknownSound(sound));
            }
        }
        if let Some(layers) = self.layers {
            if layers > MAX_LAYERS {
                return Err(ValidationError::TooManyLayers {
                    layers,
                    max: MAX_LAYERS,
                });
            }
        }
        Ok(())
    }

    /// Human-readable name of the sound effect, if any.
    pub fn sound_name(&self) -> Option<&'static str> {
        self.sound.and_then(|s| SOUNDS.get(s as usize).copied())
    }
}

/// Asset fields supplied when creating a post. The object itself has already
/// been written to storage under `storage_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAsset {
    pub storage_key: String,
    pub preview_url: String,
    #[serde(default)]
    pub properties: AssetProperties,
}

/// Input for the post write transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub asset: NewAsset,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: RawTags,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.asset.storage_key.trim().is_empty() {
            return Err(ValidationError::MissingField("storage_key"));
        }
        if self.asset.preview_url.trim().is_empty() {
            return Err(ValidationError::MissingField("preview_url"));
        }
        self.asset.properties.validate()?;
        validate_title(&self.title)
    }
}

/// Input for the post edit operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEdit {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: RawTags,
}

impl PostEdit {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)
    }
}

/// Signup / login credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Rules for new accounts. Login skips these and simply fails to match.
    pub fn validate_new(&self) -> Result<(), ValidationError> {
        let name = self.username.as_str();
        let valid = !name.is_empty()
            && name.chars().count() <= MAX_USERNAME_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ValidationError::InvalidUsername(name.to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong { max: MAX_TITLE_LEN });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_post(title: &str) -> NewPost {
        NewPost {
            asset: NewAsset {
                storage_key: "abc.sar".into(),
                preview_url: "/previews/abc.png".into(),
                properties: AssetProperties::default(),
            },
            title: title.into(),
            description: None,
            tags: RawTags::default(),
        }
    }

    #[test]
    fn ids_within_bounds_parse() {
        assert_eq!(parse_id("1"), Ok(1));
        assert_eq!(parse_id("2147483647"), Ok(i32::MAX));
        assert_eq!(parse_id("42"), Ok(42));
        assert_eq!(parse_id("007"), Ok(7));
    }

    #[test]
    fn ids_must_be_bare_digits() {
        for raw in [" 42 ", "42 ", "+42", "4 2", "\t42", "４２"] {
            assert!(
                matches!(parse_id(raw), Err(ValidationError::InvalidId(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn ids_out_of_bounds_are_rejected() {
        for raw in ["0", "-1", "2147483648", "abc", "", "1.5", "99999999999999999999"] {
            assert!(
                matches!(parse_id(raw), Err(ValidationError::InvalidId(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn offsets() {
        assert_eq!(parse_offset(None), Ok(None));
        assert_eq!(parse_offset(Some("")), Ok(None));
        assert_eq!(parse_offset(Some("40")), Ok(Some(40)));
        assert!(parse_offset(Some("-20")).is_err());
        assert!(parse_offset(Some("ten")).is_err());
    }

    #[test]
    fn title_is_required() {
        assert!(new_post("Drake").validate().is_ok());
        assert_eq!(new_post("   ").validate(), Err(ValidationError::EmptyTitle));
        assert_eq!(
            new_post(&"x".repeat(MAX_TITLE_LEN + 1)).validate(),
            Err(ValidationError::TitleTooLong { max: MAX_TITLE_LEN })
        );
    }

    #[test]
    fn storage_key_is_required() {
        let mut post = new_post("Drake");
        post.asset.storage_key = " ".into();
        assert_eq!(
            post.validate(),
            Err(ValidationError::MissingField("storage_key"))
        );
    }

    #[test]
    fn new_credentials() {
        let ok = Credentials {
            username: "rappy_fan-01".into(),
            password: "hunter22".into(),
        };
        assert!(ok.validate_new().is_ok());

        let long = "x".repeat(MAX_USERNAME_LEN + 1);
        for bad in ["", "has space", "sl/ash", long.as_str()] {
            let c = Credentials {
                username: bad.to_string(),
                password: "hunter22".into(),
            };
            assert!(matches!(
                c.validate_new(),
                Err(ValidationError::InvalidUsername(_))
            ));
        }

        let short = Credentials {
            username: "rappy".into(),
            password: "short".into(),
        };
        assert!(matches!(
            short.validate_new(),
            Err(ValidationError::PasswordTooShort { .. })
        ));
    }

    #[test]
    fn asset_properties_are_checked() {
        let mut post = new_post("Drake");
        post.asset.properties.sound = Some(SOUNDS.len() as u32);
        assert!(matches!(post.validate(), Err(ValidationError::UnknownSound(_))));

        post.asset.properties.sound = Some(2);
        post.asset.properties.layers = Some(MAX_LAYERS + 1);
        assert!(matches!(
            post.validate(),
            Err(ValidationError::TooManyLayers { .. })
        ));

        post.asset.properties.layers = Some(MAX_LAYERS);
        assert!(post.validate().is_ok());
        assert_eq!(post.asset.properties.sound_name(), Some("joy"));
    }
}
