//! `benchmate context merge`: Fold file selections into an active context
//! and print the result.

use std::path::Path;

use anyhow::{Context as _, anyhow};
use benchmate_context::{ActiveContext, AddOutcome, LineRange, ScriptDocument};

/// One `path:start-end` argument. A bare path selects the whole file.
#[derive(Debug, PartialEq, Eq)]
struct Selection<'a> {
    path: &'a str,
    range: Option<LineRange>,
}

fn parse_selection(arg: &str) -> anyhow::Result<Selection<'_>> {
    match arg.rsplit_once(':') {
        Some((path, range)) if !path.is_empty() && range.chars().next().is_some_and(|c| c.is_ascii_digit()) => {
            let range = range
                .parse::<LineRange>()
                .map_err(|e| anyhow!("bad selection '{arg}': {e}"))?;
            Ok(Selection {
                path,
                range: Some(range),
            })
        }
        _ => Ok(Selection { path: arg, range: None }),
    }
}

fn language_of(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("py") => "python",
        Some("ijm") => "ijm",
        Some("groovy") => "groovy",
        Some("js") => "javascript",
        Some("bsh") => "beanshell",
        Some("rb") => "ruby",
        _ => "text",
    }
}

pub fn merge(args: &[String], json: bool) -> anyhow::Result<()> {
    let context = fold_selections(args)?;
    let items = context.snapshot();
    if json {
        let summary: Vec<serde_json::Value> = items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "label": item.label(),
                    "mergeKey": item.merge_key(),
                    "ranges": item.range_list(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if let Some(block) = context.render() {
        println!("{block}");
    }
    Ok(())
}

/// Each distinct file gets its own tab in editor 0, in first-seen order.
fn fold_selections(args: &[String]) -> anyhow::Result<ActiveContext> {
    let context = ActiveContext::new();
    let mut tabs: Vec<&str> = Vec::new();

    for arg in args {
        let selection = parse_selection(arg)?;
        let tab = match tabs.iter().position(|p| *p == selection.path) {
            Some(tab) => tab,
            None => {
                tabs.push(selection.path);
                tabs.len() - 1
            }
        };
        let text = std::fs::read_to_string(selection.path)
            .with_context(|| format!("Failed to read {}", selection.path))?;
        let name = Path::new(selection.path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| selection.path.to_string());

        let doc = ScriptDocument {
            editor_id: 0,
            tab,
            name,
            language: language_of(selection.path).to_string(),
            text,
            selection: selection.range,
            errors: None,
        };
        let outcome = context.add(doc.to_item())?;
        let verb = match outcome {
            AddOutcome::Added => "added",
            AddOutcome::Merged => "merged",
            AddOutcome::Duplicate => "duplicate",
        };
        eprintln!("{arg}: {verb}");
    }
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path_and_range() {
        assert_eq!(
            parse_selection("doc.py:3-5").unwrap(),
            Selection {
                path: "doc.py",
                range: Some(LineRange::new(3, 5).unwrap())
            }
        );
        assert_eq!(parse_selection("doc.py").unwrap().range, None);
        assert_eq!(parse_selection("C:/work/doc.py").unwrap().path, "C:/work/doc.py");
        assert!(parse_selection("doc.py:8-3").is_err());
    }

    #[test]
    fn merges_selections_from_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.py");
        std::fs::write(&path, "a\nb\nc\nd\ne\nf\ng\nh\ni\nj\nk\nl\n").unwrap();
        let path = path.display().to_string();

        let args = vec![format!("{path}:3-5"), format!("{path}:6-8")];
        let context = fold_selections(&args).unwrap();
        assert_eq!(context.snapshot()[0].range_list(), vec!["3-8"]);

        let args = vec![format!("{path}:3-5"), format!("{path}:6-8"), format!("{path}:10-12")];
        let context = fold_selections(&args).unwrap();
        let items = context.snapshot();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].merge_key(), Some("script:0:0"));
        assert_eq!(items[0].range_list(), vec!["3-8", "10-12"]);
        merge(&args, true).unwrap();
    }

    #[test]
    fn each_file_gets_its_own_tab() {
        let tmp = tempfile::TempDir::new().unwrap();
        let first = tmp.path().join("a.py");
        let second = tmp.path().join("b.ijm");
        std::fs::write(&first, "x\ny\n").unwrap();
        std::fs::write(&second, "run();\n").unwrap();

        let args = vec![
            format!("{}:1-1", first.display()),
            format!("{}", second.display()),
            format!("{}:2-2", first.display()),
        ];
        let items = fold_selections(&args).unwrap().snapshot();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].merge_key(), Some("script:0:0"));
        assert_eq!(items[0].range_list(), vec!["1-2"]);
        assert_eq!(items[1].merge_key(), Some("script:0:1"));
        assert!(items[1].range_list().is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(merge(&["/nonexistent/benchmate/doc.py:1-2".to_string()], false).is_err());
    }

    #[test]
    fn languages_follow_extension() {
        assert_eq!(language_of("a.py"), "python");
        assert_eq!(language_of("macro.ijm"), "ijm");
        assert_eq!(language_of("README"), "text");
    }
}
