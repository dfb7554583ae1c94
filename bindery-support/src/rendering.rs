//! Text rendering utilities for human-friendly output.
//!
//! Provides helpers to shorten type names, suggest close matches for
//! unknown contracts, and render the binding table of a container.

/// Shortens a fully qualified type name for display.
///
/// Every path segment keeps only its last component, so generic
/// arguments and trait objects stay readable.
///
/// ```
/// use bindery_support::rendering::shorten_type_name;
///
/// let short = shorten_type_name("my_app::services::user::UserService");
/// assert_eq!(short, "UserService");
///
/// let short = shorten_type_name("dyn my_app::contracts::Logger");
/// assert_eq!(short, "dyn Logger");
///
/// let short = shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>");
/// assert_eq!(short, "Arc<dyn Logger>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '&' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Returns the bare name of a type: the short name without generic
/// arguments or a leading `dyn`.
///
/// This is the name callers use when registering an implementation
/// by name.
///
/// ```
/// use bindery_support::rendering::bare_type_name;
///
/// assert_eq!(bare_type_name("my_app::db::PostgresStore"), "PostgresStore");
/// assert_eq!(bare_type_name("my_app::Cache<alloc::string::String>"), "Cache");
/// assert_eq!(bare_type_name("dyn my_app::Store"), "Store");
/// ```
pub fn bare_type_name(full_name: &str) -> String {
    let trimmed = full_name.trim_start_matches("dyn ");
    let without_generics = match trimmed.find('<') {
        Some(pos) => &trimmed[..pos],
        None => trimmed,
    };
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .trim()
        .to_string()
}

/// Generates "did you mean?" suggestions based on registered type names.
///
/// Compares the requested type name against available names and
/// returns at most `max_suggestions` close matches, best first.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = bare_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter(|&&name| name != requested)
        .filter_map(|&name| {
            let name_lower = name.to_lowercase();
            let name_short = bare_type_name(name).to_lowercase();

            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((name, 100));
            }

            if !name_short.is_empty()
                && !requested_short.is_empty()
                && (name_short.contains(&requested_short) || requested_short.contains(&name_short))
            {
                return Some((name, 80));
            }

            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            if common >= 3 {
                return Some((name, common * 10));
            }

            None
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| shorten_type_name(name))
        .collect()
}

/// A row of a rendered binding table.
#[derive(Debug, Clone)]
pub struct BindingRow {
    /// Position of the binding within its contract's list.
    pub index: usize,
    /// Lifecycle label, e.g. "Singleton".
    pub lifecycle: String,
    /// Implementation type name.
    pub implementation: String,
}

/// Renders the bindings of one contract as an aligned table.
///
/// ```text
/// dyn IService
///   [0] Singleton  ServiceImpl
///   [1] Transient  TransientService
/// ```
pub fn render_binding_table(contract: &str, rows: &[BindingRow]) -> String {
    let width = rows.iter().map(|r| r.lifecycle.len()).max().unwrap_or(0);

    let mut out = shorten_type_name(contract);
    out.push('\n');
    for row in rows {
        out.push_str(&format!(
            "  [{}] {:<width$}  {}\n",
            row.index,
            row.lifecycle,
            shorten_type_name(&row.implementation),
            width = width,
        ));
    }
    out
}
