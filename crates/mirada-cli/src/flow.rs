//! Screen navigation state machine.
//!
//! Six screens, explicit transition table. Anything not listed is an
//! illegal navigation and yields `None` instead of silently coercing.

/// The screens a session can be on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Camera,
    Upload,
    Processing,
    Results,
    Privacy,
}

/// Navigation events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    OpenCamera,
    OpenUpload,
    OpenPrivacy,
    /// An image was captured or loaded and handed to the pipeline.
    ImageAccepted,
    ProcessingDone,
    Back,
}

/// Apply a navigation event to the current screen.
pub fn transition(from: Screen, nav: Nav) -> Option<Screen> {
    use Nav::*;
    use Screen::*;

    match (from, nav) {
        (Home, OpenCamera) => Some(Camera),
        (Home, OpenUpload) => Some(Upload),
        (Home, OpenPrivacy) => Some(Privacy),
        (Camera, ImageAccepted) | (Upload, ImageAccepted) => Some(Processing),
        (Camera, Back) | (Upload, Back) => Some(Home),
        (Processing, ProcessingDone) => Some(Results),
        (Results, Back) | (Privacy, Back) => Some(Home),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_fans_out() {
        assert_eq!(transition(Screen::Home, Nav::OpenCamera), Some(Screen::Camera));
        assert_eq!(transition(Screen::Home, Nav::OpenUpload), Some(Screen::Upload));
        assert_eq!(transition(Screen::Home, Nav::OpenPrivacy), Some(Screen::Privacy));
    }

    #[test]
    fn test_capture_paths_reach_processing() {
        assert_eq!(transition(Screen::Camera, Nav::ImageAccepted), Some(Screen::Processing));
        assert_eq!(transition(Screen::Upload, Nav::ImageAccepted), Some(Screen::Processing));
    }

    #[test]
    fn test_processing_only_moves_forward() {
        assert_eq!(transition(Screen::Processing, Nav::ProcessingDone), Some(Screen::Results));
        assert_eq!(transition(Screen::Processing, Nav::Back), None);
        assert_eq!(transition(Screen::Processing, Nav::OpenCamera), None);
    }

    #[test]
    fn test_back_returns_home() {
        assert_eq!(transition(Screen::Camera, Nav::Back), Some(Screen::Home));
        assert_eq!(transition(Screen::Upload, Nav::Back), Some(Screen::Home));
        assert_eq!(transition(Screen::Results, Nav::Back), Some(Screen::Home));
        assert_eq!(transition(Screen::Privacy, Nav::Back), Some(Screen::Home));
    }

    #[test]
    fn test_illegal_navigations_rejected() {
        assert_eq!(transition(Screen::Home, Nav::Back), None);
        assert_eq!(transition(Screen::Home, Nav::ImageAccepted), None);
        assert_eq!(transition(Screen::Results, Nav::ImageAccepted), None);
        assert_eq!(transition(Screen::Privacy, Nav::OpenCamera), None);
    }

    #[test]
    fn test_full_session_walk() {
        let mut screen = Screen::Home;
        for nav in [Nav::OpenUpload, Nav::ImageAccepted, Nav::ProcessingDone, Nav::Back] {
            screen = transition(screen, nav).unwrap();
        }
        assert_eq!(screen, Screen::Home);
    }
}
