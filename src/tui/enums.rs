//! Enumerations for TUI state management.

/// The four top-level views, addressed by a route like a small web app.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum View {
    Dashboard,
    Tasks,
    Hierarchy,
    Flow,
}

impl View {
    pub const ALL: [View; 4] = [View::Dashboard, View::Tasks, View::Hierarchy, View::Flow];

    pub fn route(self) -> &'static str {
        match self {
            View::Dashboard => "/",
            View::Tasks => "/tasks",
            View::Hierarchy => "/hierarchy",
            View::Flow => "/flow",
        }
    }

    /// Unknown routes fall back to the dashboard.
    pub fn from_route(route: &str) -> View {
        View::ALL
            .into_iter()
            .find(|v| v.route() == route)
            .unwrap_or(View::Dashboard)
    }

    pub fn title(self) -> &'static str {
        match self {
            View::Dashboard => "Dashboard",
            View::Tasks => "All Tasks",
            View::Hierarchy => "Hierarchy",
            View::Flow => "Flow Board",
        }
    }

    fn position(self) -> usize {
        View::ALL.iter().position(|v| *v == self).unwrap_or(0)
    }

    pub fn next(self) -> View {
        View::ALL[(self.position() + 1) % View::ALL.len()]
    }

    pub fn prev(self) -> View {
        View::ALL[(self.position() + View::ALL.len() - 1) % View::ALL.len()]
    }
}

/// What the keyboard is currently driving.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AppState {
    Browse,
    AddTask,
    EditTask,
    Confirm,
    Help,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_round_trip_and_unknown_falls_back() {
        for view in View::ALL {
            assert_eq!(View::from_route(view.route()), view);
        }
        assert_eq!(View::from_route("/nowhere"), View::Dashboard);
    }

    #[test]
    fn tab_order_wraps() {
        assert_eq!(View::Flow.next(), View::Dashboard);
        assert_eq!(View::Dashboard.prev(), View::Flow);
        assert_eq!(View::Tasks.next(), View::Hierarchy);
    }
}
