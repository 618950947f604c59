use crate::application::query::decode_species;
use crate::domain::model::{QueryEntry, QueryStatus};
use crate::presentation::theme::Theme;
use std::fmt::Write;

pub const INTRO: &str = "As you visit the pokemon below, you will notice them in a loading state \
the first time you load them. However, after you return to this list and click on any pokemon \
you have already visited again, you will see them load instantly and background refresh right \
before your eyes!";

pub const INTRO_NOTE: &str =
    "(You may need to throttle your network speed to simulate longer loading sequences)";

/// Render one frame of the page for `entry`.
///
/// `is_cached(id)` decides whether a species link gets the visited style.
pub fn render_page<F>(entry: &QueryEntry, is_cached: F, theme: &Theme) -> String
where
    F: Fn(i64) -> bool,
{
    let mut output = String::new();

    writeln!(output, "{} {}", (theme.para)(INTRO), (theme.strong)(INTRO_NOTE)).ok();
    writeln!(output).ok();
    writeln!(output, "{}", (theme.title)("Pokemon")).ok();
    writeln!(output).ok();

    match entry.status() {
        QueryStatus::Pending => {
            writeln!(output, "  {}", (theme.loading)("Loading...")).ok();
        }
        QueryStatus::Error => {
            let message = entry.error().map(|e| e.message.as_str()).unwrap_or("unknown error");
            writeln!(output, "  {}", (theme.error)(&format!("Error: {}", message))).ok();
        }
        QueryStatus::Success => match decode_species(entry) {
            Ok(species) => {
                for pokemon in &species {
                    let link = if is_cached(pokemon.id) {
                        (theme.visited)(&pokemon.name)
                    } else {
                        (theme.link)(&pokemon.name)
                    };
                    writeln!(output, "  {}", link).ok();
                }
                writeln!(output).ok();
                if entry.is_fetching {
                    writeln!(output, "  {}", (theme.updating)("Background Updating...")).ok();
                }
            }
            Err(e) => {
                writeln!(output, "  {}", (theme.error)(&format!("Error: {}", e))).ok();
            }
        },
    }

    output
}
