use std::ops::Range;

use regex::Regex;

use crate::model::task::Task;

/// Which field of a task matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Id,
    Title,
    Description,
}

/// A search hit for a task field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub task_id: String,
    pub field: MatchField,
    pub spans: Vec<Range<usize>>,
}

/// Compile a search query: case-insensitive regex, falling back to a literal
/// match when the pattern is not a valid regex. Blank queries yield `None`.
pub fn compile_query(pattern: &str) -> Option<Regex> {
    if pattern.trim().is_empty() {
        return None;
    }
    Regex::new(&format!("(?i){}", pattern))
        .or_else(|_| Regex::new(&format!("(?i){}", regex::escape(pattern))))
        .ok()
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
pub fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Whether the task itself (not its subtasks) matches.
pub fn task_matches(re: &Regex, task: &Task) -> bool {
    re.is_match(&task.id) || re.is_match(&task.title) || re.is_match(&task.description)
}

/// Search every task in the tree, pre-order.
pub fn search_tasks(tasks: &[Task], re: &Regex) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for task in tasks {
        search_task(re, task, &mut hits);
    }
    hits
}

fn search_task(re: &Regex, task: &Task, hits: &mut Vec<SearchHit>) {
    let fields = [
        (MatchField::Id, task.id.as_str()),
        (MatchField::Title, task.title.as_str()),
        (MatchField::Description, task.description.as_str()),
    ];
    for (field, text) in fields {
        let spans = find_matches(re, text);
        if !spans.is_empty() {
            hits.push(SearchHit {
                task_id: task.id.clone(),
                field,
                spans,
            });
        }
    }
    for sub in &task.subtasks {
        search_task(re, sub, hits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, title: &str, desc: &str) -> Task {
        let mut t = Task::new(id, title);
        t.description = desc.into();
        t
    }

    #[test]
    fn query_is_case_insensitive() {
        let re = compile_query("AUTH").unwrap();
        assert!(task_matches(&re, &task("1", "Add auth flow", "")));
    }

    #[test]
    fn invalid_regex_matches_literally() {
        let re = compile_query("fix (parser").unwrap();
        assert!(task_matches(&re, &task("1", "Fix (parser crash", "")));
        assert!(!task_matches(&re, &task("2", "Fix parser", "")));
    }

    #[test]
    fn blank_query_is_none() {
        assert!(compile_query("").is_none());
        assert!(compile_query("   ").is_none());
    }

    #[test]
    fn hits_cover_id_and_description() {
        let mut parent = task("3", "Parent", "");
        parent.subtasks.push(task("3.1", "Child", "touches the cache layer"));
        let re = compile_query("cache").unwrap();
        let hits = search_tasks(&[parent], &re);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].task_id, "3.1");
        assert_eq!(hits[0].field, MatchField::Description);
        assert_eq!(hits[0].spans, vec![12..17]);
    }

    #[test]
    fn id_matches() {
        let re = compile_query(r"^3\.1$").unwrap();
        assert!(task_matches(&re, &task("3.1", "x", "")));
        assert!(!task_matches(&re, &task("3.10", "x", "")));
    }
}
