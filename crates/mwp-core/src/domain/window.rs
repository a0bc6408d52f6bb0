//! Window identity and window-selection criteria.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::geometry::{Point, Rect};

/// Opaque, stable identifier of one top-level window.
///
/// On Windows this is the raw `HWND` value.  It stays valid for the life of
/// the window and is never reused while the window exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Snapshot of one tracked window.
///
/// The client rectangle is in screen coordinates and is refreshed by the
/// owning control loop once per tick via the window registry.  The title and
/// process name are diagnostic only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowHandle {
    pub id: WindowId,
    pub client_rect: Rect,
    pub title: String,
    pub process_name: String,
}

impl WindowHandle {
    pub fn new(
        id: WindowId,
        client_rect: Rect,
        title: impl Into<String>,
        process_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            client_rect,
            title: title.into(),
            process_name: process_name.into(),
        }
    }

    /// Returns a copy carrying a freshly resolved client rectangle.
    pub fn with_client_rect(&self, client_rect: Rect) -> Self {
        Self {
            client_rect,
            ..self.clone()
        }
    }

    /// The window's reference point: the center of its client area, in
    /// window-relative coordinates.
    pub fn reference_point(&self) -> Point {
        Point::new(
            (self.client_rect.width / 2) as i32,
            (self.client_rect.height / 2) as i32,
        )
    }

    /// Converts a window-relative point into screen coordinates.
    pub fn to_screen(&self, p: Point) -> Point {
        p.offset(self.client_rect.x, self.client_rect.y)
    }
}

/// Which top-level windows get a control loop.
///
/// A window matches when its process name contains one of `process_names`
/// **or** its title contains one of `title_keywords` (both compared
/// case-insensitively), and its outer size is at least
/// `min_width` x `min_height`.  Untitled windows never match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowCriteria {
    pub process_names: Vec<String>,
    pub title_keywords: Vec<String>,
    pub min_width: u32,
    pub min_height: u32,
}

impl WindowCriteria {
    /// Evaluates the criteria against one enumerated window.
    pub fn matches(&self, title: &str, process_name: &str, width: u32, height: u32) -> bool {
        if title.trim().is_empty() {
            return false;
        }
        if width < self.min_width || height < self.min_height {
            return false;
        }

        let process_lower = process_name.to_lowercase();
        let by_process = self
            .process_names
            .iter()
            .filter(|name| !name.is_empty())
            .any(|name| process_lower.contains(&name.to_lowercase()));
        if by_process {
            return true;
        }

        let title_lower = title.to_lowercase();
        self.title_keywords
            .iter()
            .filter(|kw| !kw.is_empty())
            .any(|kw| title_lower.contains(&kw.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> WindowCriteria {
        WindowCriteria {
            process_names: vec!["Game.exe".to_string()],
            title_keywords: vec!["Realm".to_string()],
            min_width: 120,
            min_height: 15,
        }
    }

    #[test]
    fn test_window_id_displays_as_hex() {
        assert_eq!(WindowId(0x1A2B).to_string(), "0x00001A2B");
    }

    #[test]
    fn test_reference_point_is_client_center_relative() {
        let w = WindowHandle::new(WindowId(1), Rect::new(500, 300, 800, 600), "t", "p.exe");
        assert_eq!(w.reference_point(), Point::new(400, 300));
        assert_eq!(w.to_screen(w.reference_point()), Point::new(900, 600));
    }

    #[test]
    fn test_with_client_rect_keeps_identity() {
        let w = WindowHandle::new(WindowId(7), Rect::new(0, 0, 10, 10), "t", "p.exe");
        let moved = w.with_client_rect(Rect::new(50, 50, 20, 20));
        assert_eq!(moved.id, WindowId(7));
        assert_eq!(moved.client_rect.x, 50);
        assert_eq!(moved.title, "t");
    }

    #[test]
    fn test_matches_by_process_name_case_insensitive() {
        assert!(criteria().matches("anything", "GAME.EXE", 800, 600));
    }

    #[test]
    fn test_matches_by_title_keyword_case_insensitive() {
        assert!(criteria().matches("The realm of Foo", "other.exe", 800, 600));
    }

    #[test]
    fn test_rejects_untitled_window() {
        assert!(!criteria().matches("   ", "Game.exe", 800, 600));
    }

    #[test]
    fn test_rejects_window_below_min_size() {
        assert!(!criteria().matches("Realm", "Game.exe", 119, 600));
        assert!(!criteria().matches("Realm", "Game.exe", 800, 14));
    }

    #[test]
    fn test_rejects_unrelated_window() {
        assert!(!criteria().matches("Notepad", "notepad.exe", 800, 600));
    }

    #[test]
    fn test_empty_patterns_never_match_everything() {
        let c = WindowCriteria {
            process_names: vec![String::new()],
            title_keywords: vec![String::new()],
            min_width: 0,
            min_height: 0,
        };
        assert!(!c.matches("Notepad", "notepad.exe", 800, 600));
    }
}
