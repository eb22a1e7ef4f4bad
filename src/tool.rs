use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shape::{ShapeKind, UnknownShapeKind};

/// Exclusive interaction mode. Being an enum, at most one of selection,
/// draw and text can be active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ToolMode {
    /// No tool: clicks neither create nor select.
    #[default]
    Idle,
    Selection,
    Draw(ShapeKind),
    Text,
}

impl ToolMode {
    pub fn is_selection(self) -> bool {
        self == ToolMode::Selection
    }

    pub fn is_draw(self) -> bool {
        matches!(self, ToolMode::Draw(_))
    }

    pub fn is_text(self) -> bool {
        self == ToolMode::Text
    }

    pub fn shape(self) -> Option<ShapeKind> {
        match self {
            ToolMode::Draw(kind) => Some(kind),
            _ => None,
        }
    }

    /// Objects are only movable while the selection tool is active.
    pub fn objects_interactive(self) -> bool {
        self.is_selection()
    }
}

impl fmt::Display for ToolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolMode::Idle => f.write_str("none"),
            ToolMode::Selection => f.write_str("select"),
            ToolMode::Draw(kind) => write!(f, "{kind}"),
            ToolMode::Text => f.write_str("text"),
        }
    }
}

impl FromStr for ToolMode {
    type Err = UnknownShapeKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "idle" => Ok(ToolMode::Idle),
            "select" | "selection" => Ok(ToolMode::Selection),
            "text" => Ok(ToolMode::Text),
            other => other.parse().map(ToolMode::Draw),
        }
    }
}

impl Serialize for ToolMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ToolMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Tool mode plus the toolbar affordances that belong to it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolState {
    mode: ToolMode,
    shape_menu_open: bool,
}

impl ToolState {
    pub fn new(mode: ToolMode) -> Self {
        Self {
            mode,
            shape_menu_open: false,
        }
    }

    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    pub fn shape_menu_open(&self) -> bool {
        self.shape_menu_open
    }

    /// Switch to `mode`, closing every affordance of the previous one.
    pub fn set_mode(&mut self, mode: ToolMode) {
        if self.mode != mode {
            log::debug!("tool mode {} -> {}", self.mode, mode);
        }
        self.mode = mode;
        self.shape_menu_open = false;
    }

    pub fn toggle_selection(&mut self) {
        let next = if self.mode.is_selection() {
            ToolMode::Idle
        } else {
            ToolMode::Selection
        };
        self.set_mode(next);
    }

    pub fn toggle_text(&mut self) {
        let next = if self.mode.is_text() {
            ToolMode::Idle
        } else {
            ToolMode::Text
        };
        self.set_mode(next);
    }

    pub fn toggle_shape_menu(&mut self) {
        self.shape_menu_open = !self.shape_menu_open;
    }

    /// Picking the active kind again turns drawing off.
    pub fn choose_shape(&mut self, kind: ShapeKind) {
        let next = if self.mode == ToolMode::Draw(kind) {
            ToolMode::Idle
        } else {
            ToolMode::Draw(kind)
        };
        self.set_mode(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_count(mode: ToolMode) -> usize {
        [mode.is_selection(), mode.is_draw(), mode.is_text()]
            .into_iter()
            .filter(|b| *b)
            .count()
    }

    #[test]
    fn draw_to_text_is_exclusive_and_closes_menu() {
        let mut tools = ToolState::new(ToolMode::Draw(ShapeKind::Rectangle));
        tools.toggle_shape_menu();
        assert!(tools.shape_menu_open());

        tools.toggle_text();
        assert_eq!(tools.mode(), ToolMode::Text);
        assert_eq!(active_count(tools.mode()), 1);
        assert!(!tools.shape_menu_open());
    }

    #[test]
    fn choosing_same_shape_toggles_off() {
        let mut tools = ToolState::new(ToolMode::Selection);
        tools.choose_shape(ShapeKind::Circle);
        assert_eq!(tools.mode(), ToolMode::Draw(ShapeKind::Circle));
        tools.choose_shape(ShapeKind::Line);
        assert_eq!(tools.mode(), ToolMode::Draw(ShapeKind::Line));
        tools.choose_shape(ShapeKind::Line);
        assert_eq!(tools.mode(), ToolMode::Idle);
        assert_eq!(active_count(tools.mode()), 0);
    }

    #[test]
    fn selection_and_text_toggle() {
        let mut tools = ToolState::default();
        tools.toggle_selection();
        assert!(tools.mode().objects_interactive());
        tools.toggle_selection();
        assert_eq!(tools.mode(), ToolMode::Idle);
        tools.toggle_text();
        tools.toggle_text();
        assert_eq!(tools.mode(), ToolMode::Idle);
    }

    #[test]
    fn parses_config_names() {
        assert_eq!("select".parse::<ToolMode>(), Ok(ToolMode::Selection));
        assert_eq!("Text".parse::<ToolMode>(), Ok(ToolMode::Text));
        assert_eq!("none".parse::<ToolMode>(), Ok(ToolMode::Idle));
        assert_eq!("cover".parse::<ToolMode>(), Ok(ToolMode::Draw(ShapeKind::Cover)));
        assert!("lasso".parse::<ToolMode>().is_err());

        let json = serde_json::to_string(&ToolMode::Draw(ShapeKind::Ellipse)).expect("ser");
        assert_eq!(json, "\"ellipse\"");
    }
}
