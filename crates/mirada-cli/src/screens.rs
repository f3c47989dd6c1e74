//! Terminal renditions of the screens.
//!
//! Rendering returns strings so screens stay testable; `main` decides
//! where they go.

use crate::engine::{ProfileCard, ScanOutcome, ScanReport};

pub fn render_home() -> String {
    [
        "mirada — face lookup",
        "",
        "  [1] scan with camera",
        "  [2] upload an image",
        "  [3] privacy notice",
        "  [q] quit",
        "",
    ]
    .join("\n")
}

pub fn render_camera_prompt() -> String {
    "Camera ready. Press enter to capture, or 'b' to go back.".to_string()
}

pub fn render_upload_prompt() -> String {
    "Enter the path of an image to analyze, or 'b' to go back.".to_string()
}

pub fn render_processing() -> String {
    "Analyzing image...".to_string()
}

pub fn render_privacy() -> String {
    [
        "Privacy notice",
        "",
        "Images are processed in memory on this machine only. Nothing is",
        "uploaded, and no capture or embedding is written to disk. The",
        "profile gallery is demonstration data, not a real identity",
        "database.",
        "",
    ]
    .join("\n")
}

pub fn render_results(report: &ScanReport) -> String {
    match &report.outcome {
        ScanOutcome::Rejected { message } => format!("Scan rejected: {message}"),
        ScanOutcome::NoMatch { confidence, .. } => {
            format!("User Not Found (best confidence {:.0}%)", confidence * 100.0)
        }
        ScanOutcome::Match { profile, confidence_percent, .. } => {
            let mut out = format!("Match found: {} ({confidence_percent}%)\n", profile.name);
            out.push_str(&render_card(profile));
            out
        }
    }
}

fn render_card(card: &ProfileCard) -> String {
    let verified = if card.verified { "verified" } else { "unverified" };
    format!(
        "  id:         {}\n  age:        {}\n  occupation: {}\n  location:   {}\n  last seen:  {}\n  status:     {}",
        card.id, card.age, card.occupation, card.location, card.last_seen, verified
    )
}

pub fn render_gallery(cards: &[ProfileCard]) -> String {
    if cards.is_empty() {
        return "Gallery is empty.".to_string();
    }
    let mut out = format!("{} profile(s) enrolled:\n", cards.len());
    for card in cards {
        out.push_str(&format!(
            "  [{}] {} — {}, {} ({})\n",
            card.id,
            card.name,
            card.occupation,
            card.location,
            if card.verified { "verified" } else { "unverified" }
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn card() -> ProfileCard {
        ProfileCard {
            id: "001".into(),
            name: "Ana Torres".into(),
            age: 28,
            occupation: "Software Engineer".into(),
            location: "San Francisco, CA".into(),
            last_seen: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            verified: true,
        }
    }

    #[test]
    fn test_match_rendering() {
        let report = ScanReport {
            session: Uuid::new_v4(),
            outcome: ScanOutcome::Match {
                profile: card(),
                confidence: 0.82,
                confidence_percent: 82,
                distance: 0.18,
            },
        };
        let text = render_results(&report);
        assert!(text.contains("Match found: Ana Torres (82%)"));
        assert!(text.contains("San Francisco"));
        assert!(text.contains("2024-01-15"));
    }

    #[test]
    fn test_no_match_rendering() {
        let report = ScanReport {
            session: Uuid::new_v4(),
            outcome: ScanOutcome::NoMatch { confidence: 0.31, distance: Some(0.69) },
        };
        assert!(render_results(&report).contains("User Not Found"));
    }

    #[test]
    fn test_rejection_rendering_carries_message() {
        let report = ScanReport {
            session: Uuid::new_v4(),
            outcome: ScanOutcome::Rejected { message: "image too blurry".into() },
        };
        assert!(render_results(&report).contains("image too blurry"));
    }

    #[test]
    fn test_gallery_rendering() {
        let text = render_gallery(&[card()]);
        assert!(text.contains("1 profile(s)"));
        assert!(text.contains("Ana Torres"));
        assert!(render_gallery(&[]).contains("empty"));
    }
}
