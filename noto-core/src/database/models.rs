//! Database models
//!
//! Rust structs representing the persisted entities.
//! The same structs travel inside backup documents, so every model
//! serializes with camelCase keys and tolerates absent optional keys.

use crate::config::GENERAL_FOLDER_ID;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Declares a closed enum stored as TEXT and serialized by variant name.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident),+ $(,)? } default $default:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                match value.as_str() {
                    $(stringify!($variant) => Ok($name::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: stringify!($name),
                        value,
                    }),
                }
            }
        }
    };
}

/// A stored enum column held a value no variant matches
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} variant: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

text_enum! {
    /// Accent color of a folder
    NotoColor {
        Gray, Blue, Pink, Cyan, Purple, Red, Yellow, Orange, Green, Brown,
        BlueGray, Teal, Indigo, DeepPurple, DeepOrange, DeepGreen, LightBlue,
        LightGreen, LightRed, LightPink, Black,
    } default Gray
}

text_enum! {
    /// Icon shown next to a folder title
    NotoIcon {
        Folder, Notebook, Work, Code, Book, Star, Heart, Home, Travel, Music, Idea,
    } default Folder
}

text_enum! {
    /// Field a folder sorts its notes by
    SortingType { Manual, CreationDate, Alphabetical, AccessDate } default CreationDate
}

text_enum! {
    SortingOrder { Ascending, Descending } default Descending
}

text_enum! {
    Layout { Linear, Grid } default Linear
}

text_enum! {
    /// Where the cursor lands when a new note opens
    NewNoteCursorPosition { Body, Title } default Body
}

text_enum! {
    Theme { System, SystemBlack, Light, Dark, Black } default System
}

text_enum! {
    Font { Nunito, Monospace } default Nunito
}

text_enum! {
    Language {
        System, English, Turkish, Arabic, Indonesian, Russian, Tamil, Spanish,
        French, German, Italian, Czech, Lithuanian, SimplifiedChinese, Portuguese,
    } default System
}

text_enum! {
    /// How long the vault stays open after unlocking
    VaultTimeout {
        Immediately, OnAppClose, After1Hour, After4Hours, After12Hours,
    } default Immediately
}

/// A folder (library) containing notes and labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Store-assigned; 0 means "not yet persisted"
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    #[sqlx(try_from = "String")]
    pub color: NotoColor,
    #[serde(default)]
    #[sqlx(try_from = "String")]
    pub icon: NotoIcon,
    #[serde(default)]
    pub position: i64,
    #[serde(default = "Utc::now")]
    pub creation_date: DateTime<Utc>,
    #[serde(default)]
    #[sqlx(try_from = "String")]
    pub sorting_type: SortingType,
    #[serde(default)]
    #[sqlx(try_from = "String")]
    pub sorting_order: SortingOrder,
    #[serde(default)]
    #[sqlx(try_from = "String")]
    pub layout: Layout,
    #[serde(default = "default_true")]
    pub show_notes_count: bool,
    #[serde(default)]
    pub show_note_creation_date: bool,
    #[serde(default)]
    #[sqlx(try_from = "String")]
    pub new_note_cursor: NewNoteCursorPosition,
    #[serde(default)]
    pub notification_interface: bool,
    /// Marks the one general folder of an installation
    #[serde(default, alias = "general")]
    pub is_general: bool,
}

fn default_true() -> bool {
    true
}

impl Folder {
    /// A new, not yet persisted folder with default presentation settings
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            color: NotoColor::default(),
            icon: NotoIcon::default(),
            position: 0,
            creation_date: Utc::now(),
            sorting_type: SortingType::default(),
            sorting_order: SortingOrder::default(),
            layout: Layout::default(),
            show_notes_count: true,
            show_note_creation_date: false,
            new_note_cursor: NewNoteCursorPosition::default(),
            notification_interface: false,
            is_general: false,
        }
    }

    /// Whether this record is the live general folder
    pub fn is_live_general(&self) -> bool {
        self.is_general && self.id == GENERAL_FOLDER_ID
    }
}

/// A note owned by a folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub folder_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub is_starred: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default = "Utc::now")]
    pub creation_date: DateTime<Utc>,
    /// Last time the note was modified or opened
    #[serde(default)]
    pub access_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_date: Option<DateTime<Utc>>,
}

impl Note {
    pub fn new(folder_id: i64, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: 0,
            folder_id,
            title: title.into(),
            body: body.into(),
            position: 0,
            is_starred: false,
            is_archived: false,
            creation_date: Utc::now(),
            access_date: None,
            reminder_date: None,
        }
    }

    /// A note is valid when either its title or its body has visible content
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() || !self.body.trim().is_empty()
    }
}

/// A label scoped to a folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: i64,
    pub folder_id: i64,
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(default)]
    pub position: i64,
}

impl Label {
    pub fn new(folder_id: i64, title: impl Into<String>) -> Self {
        Self {
            id: 0,
            folder_id,
            title: title.into(),
            position: 0,
        }
    }
}

/// Join row linking a note to a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NoteLabel {
    pub id: i64,
    pub note_id: i64,
    pub label_id: i64,
}

impl NoteLabel {
    pub fn new(note_id: i64, label_id: i64) -> Self {
        Self {
            id: 0,
            note_id,
            label_id,
        }
    }
}

/// Process-wide application settings (singleton record)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: Theme,
    pub font: Font,
    pub language: Language,
    pub is_show_notes_count: bool,
    pub is_do_not_disturb: bool,
    pub is_screen_on: bool,
    pub is_full_screen: bool,
    /// SHA-256 hex digest of the vault passcode
    pub vault_passcode: Option<String>,
    pub vault_timeout: VaultTimeout,
    pub is_bio_auth_enabled: bool,
    pub main_interface_id: i64,
    pub last_version: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            font: Font::default(),
            language: Language::default(),
            is_show_notes_count: true,
            is_do_not_disturb: false,
            is_screen_on: true,
            is_full_screen: true,
            vault_passcode: None,
            vault_timeout: VaultTimeout::default(),
            is_bio_auth_enabled: false,
            main_interface_id: GENERAL_FOLDER_ID,
            last_version: String::new(),
        }
    }
}
