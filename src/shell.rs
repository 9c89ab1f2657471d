use std::fmt;

use crate::error::ConsoleError;

pub const TITLE: &str = "Vector Database Manager";

/// Pages reachable from the side panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    CreateVector,
    EditPoints,
}

impl Route {
    pub const ALL: [Route; 2] = [Route::CreateVector, Route::EditPoints];

    pub fn path(self) -> &'static str {
        match self {
            Route::CreateVector => "/",
            Route::EditPoints => "/edit",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Route::CreateVector => "Home",
            Route::EditPoints => "Edit points",
        }
    }

    pub fn from_path(path: &str) -> Result<Self, ConsoleError> {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" => "/",
            other => other,
        };
        Route::ALL
            .into_iter()
            .find(|route| route.path() == normalized)
            .ok_or_else(|| ConsoleError::UnknownRoute(path.to_string()))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub route: Route,
    pub label: &'static str,
    pub active: bool,
}

/// Navigation frame around the active page. Holds no page data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    active: Route,
    side_panel_collapsed: bool,
}

impl Default for Shell {
    fn default() -> Self {
        Self {
            active: Route::CreateVector,
            side_panel_collapsed: false,
        }
    }
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Route {
        self.active
    }

    pub fn activate(&mut self, route: Route) {
        self.active = route;
    }

    pub fn navigate(&mut self, path: &str) -> Result<Route, ConsoleError> {
        let route = Route::from_path(path)?;
        self.active = route;
        Ok(route)
    }

    pub fn is_side_panel_collapsed(&self) -> bool {
        self.side_panel_collapsed
    }

    pub fn toggle_side_panel(&mut self) -> bool {
        self.side_panel_collapsed = !self.side_panel_collapsed;
        self.side_panel_collapsed
    }

    pub fn nav_items(&self) -> Vec<NavItem> {
        Route::ALL
            .into_iter()
            .map(|route| NavItem {
                route,
                label: route.label(),
                active: route == self.active,
            })
            .collect()
    }

    /// Plain-text header and navigation; a collapsed panel shows the title only.
    pub fn render_nav(&self) -> String {
        let mut out = String::from(TITLE);
        if self.side_panel_collapsed {
            return out;
        }
        for item in self.nav_items() {
            let marker = if item.active { '>' } else { ' ' };
            out.push_str(&format!("\n {} {:<12} {}", marker, item.label, item.route.path()));
        }
        out
    }
}
