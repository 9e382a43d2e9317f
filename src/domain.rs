use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MdexError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub name: String,
    pub volume: String,
    pub title: String,
    pub language: String,
    pub pages: u32,
    pub group: Option<String>,
}

impl Chapter {
    pub fn new(id: impl Into<String>, name: impl Into<String>, pages: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            volume: String::new(),
            title: String::new(),
            language: String::new(),
            pages,
            group: None,
        }
    }

    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = volume.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pages == 0
    }

    pub fn weight(&self) -> u64 {
        u64::from(self.pages)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    pub urls: Vec<String>,
}

impl Unit {
    pub fn new(name: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            name: name.into(),
            urls,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quality {
    DataSaver,
    Original,
}

impl Quality {
    pub fn from_raw_flag(raw: bool) -> Self {
        if raw {
            Quality::Original
        } else {
            Quality::DataSaver
        }
    }

    pub fn path_segment(self) -> &'static str {
        match self {
            Quality::DataSaver => "data-saver",
            Quality::Original => "data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = MdexError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(MdexError::Config(format!(
                "expect order to be \"asc\" or \"desc\", found \"{other}\""
            ))),
        }
    }
}
