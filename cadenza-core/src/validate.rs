//! Document validation: recompute derived state after a mutation.
//!
//! Two passes, both scopable through [`ValidateOptions`]: a timing pass that
//! keeps notes ordered and part durations covering their content, and a
//! phonemizer pass that resolves each track's capability tag against the
//! catalog and recomputes note phonemes.

use cadenza_types::Project;

use crate::command::ValidateOptions;
use crate::phonemizer::PhonemizerCatalog;

/// Run a scoped validation pass.
pub fn validate(project: &mut Project, catalog: &PhonemizerCatalog, options: &ValidateOptions) {
    let part_range = match options.part {
        Some(idx) if idx < project.parts.len() => idx..idx + 1,
        Some(idx) => {
            log::warn!(target: "validate", "scoped part {idx} out of range, validating all");
            0..project.parts.len()
        }
        None => 0..project.parts.len(),
    };

    if !options.skip_timing {
        for part in &mut project.parts[part_range.clone()] {
            part.notes.sort_by_key(|n| n.position);
            part.duration = part.duration.max(part.notes_end());
        }
    }

    if !options.skip_phonemizer {
        // One warning per track per pass, however many parts reference it.
        for track_no in tracks_missing_capability(project, catalog, part_range.clone()) {
            log::warn!(
                target: "validate",
                "phonemizer {} not available, using built-in",
                project.tracks[track_no].phonemizer
            );
        }
        for idx in part_range {
            let track_no = project.parts[idx].track_no;
            let Some(track) = project.tracks.get(track_no) else {
                log::warn!(target: "validate", "part {idx} references missing track {track_no}");
                continue;
            };
            if options.skip_phoneme {
                continue;
            }
            let phonemizer = catalog.resolve(&track.phonemizer);
            for note in &mut project.parts[idx].notes {
                note.phonemes = phonemizer.phonemize(&note.lyric);
            }
        }
    }
}

/// Tracks referenced by the in-scope parts whose capability tag is absent
/// from the catalog. Each track appears once, in first-reference order.
fn tracks_missing_capability(
    project: &Project,
    catalog: &PhonemizerCatalog,
    parts: std::ops::Range<usize>,
) -> Vec<usize> {
    let mut missing = Vec::new();
    for part in &project.parts[parts] {
        let Some(track) = project.tracks.get(part.track_no) else {
            continue;
        };
        if !catalog.contains(&track.phonemizer) && !missing.contains(&part.track_no) {
            missing.push(part.track_no);
        }
    }
    missing
}

/// Full-document validation: everything, every part.
pub fn validate_full(project: &mut Project, catalog: &PhonemizerCatalog) {
    validate(project, catalog, &ValidateOptions::default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phonemizer::builtin_descriptors;
    use cadenza_types::{Note, Part, Track};

    fn project_with_notes() -> Project {
        let mut project = Project::new();
        project.tracks.push(Track::new("Lead"));
        let mut part = Part::new("Verse", 0, 0);
        part.notes.push(Note::new(480, 240, 62, "i"));
        part.notes.push(Note::new(0, 480, 60, "a"));
        project.parts.push(part);
        project
    }

    #[test]
    fn timing_pass_sorts_notes_and_extends_duration() {
        let mut project = project_with_notes();
        let catalog = PhonemizerCatalog::new(builtin_descriptors());
        validate_full(&mut project, &catalog);

        let part = &project.parts[0];
        assert_eq!(part.notes[0].position, 0);
        assert_eq!(part.notes[1].position, 480);
        assert_eq!(part.duration, 720);
    }

    #[test]
    fn phoneme_pass_fills_phonemes() {
        let mut project = project_with_notes();
        let catalog = PhonemizerCatalog::new(builtin_descriptors());
        validate_full(&mut project, &catalog);

        assert_eq!(project.parts[0].notes[0].phonemes, vec!["a".to_string()]);
        assert_eq!(project.parts[0].notes[1].phonemes, vec!["i".to_string()]);
    }

    #[test]
    fn skip_phoneme_leaves_phonemes_untouched() {
        let mut project = project_with_notes();
        let catalog = PhonemizerCatalog::new(builtin_descriptors());
        let options = ValidateOptions {
            skip_phoneme: true,
            ..ValidateOptions::default()
        };
        validate(&mut project, &catalog, &options);
        assert!(project.parts[0].notes[0].phonemes.is_empty());
    }

    #[test]
    fn scoped_part_leaves_other_parts_alone() {
        let mut project = project_with_notes();
        let mut other = Part::new("Chorus", 0, 4000);
        other.notes.push(Note::new(0, 480, 64, "u"));
        project.parts.push(other);

        let catalog = PhonemizerCatalog::new(builtin_descriptors());
        validate(&mut project, &catalog, &ValidateOptions::part(0));

        assert_eq!(project.parts[0].notes[0].phonemes, vec!["a".to_string()]);
        assert!(project.parts[1].notes[0].phonemes.is_empty());
        assert_eq!(project.parts[1].duration, 0);
    }

    #[test]
    fn missing_capability_reported_once_per_track() {
        let mut project = Project::new();
        project.tracks.push(Track::new("Lead"));
        project.tracks.push(Track::new("Harm"));
        project.tracks[0].phonemizer = "NO-SUCH".to_string();
        project.parts.push(Part::new("Verse", 0, 0));
        project.parts.push(Part::new("Chorus", 0, 4000));
        project.parts.push(Part::new("Bridge", 1, 8000));

        let catalog = PhonemizerCatalog::new(builtin_descriptors());
        let missing = tracks_missing_capability(&project, &catalog, 0..project.parts.len());
        assert_eq!(missing, vec![0]);
    }

    #[test]
    fn missing_phonemizer_falls_back_to_builtin() {
        let mut project = project_with_notes();
        project.tracks[0].phonemizer = "NO-SUCH".to_string();
        let catalog = PhonemizerCatalog::new(builtin_descriptors());
        validate_full(&mut project, &catalog);
        assert_eq!(project.parts[0].notes[0].phonemes, vec!["a".to_string()]);
    }
}
