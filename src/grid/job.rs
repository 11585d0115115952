//! Jobs as reported by qstat, plus array-task expansion.

use crate::error::GridError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};

/// Matches array task ranges such as `40-55:1` (tasks 40 through 55, step 1)
static TASK_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)-(\d+):(\d+)").expect("task range regex is valid"));

/// Upper bound on the jobs a single task range may expand into
const MAX_EXPANDED_TASKS: i128 = 100_000;

/// State codes that always indicate a job in trouble
const ERROR_STATES: [&str; 2] = ["auo", "dt"];

/// Array task information for a job.
///
/// `source` is the raw `<tasks>` text, which is either a single id, a range
/// (`1-10:2`) or a group (`1,4,7`). `task_id` is only known for single tasks
/// and for jobs produced by [`Job::expand_tasks`].
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(from = "String")]
pub struct Task {
    pub source: String,
    pub task_id: Option<i64>,
}

impl From<String> for Task {
    fn from(source: String) -> Self {
        let source = source.trim().to_string();
        let task_id = source.parse().ok();
        Self { source, task_id }
    }
}

/// A job running on a host or waiting in the pending list
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Job {
    #[serde(
        rename(deserialize = "@state", serialize = "state_attribute_text"),
        default
    )]
    pub state_attribute: String,
    #[serde(default)]
    pub state: String,
    #[serde(
        rename(deserialize = "JB_job_number", serialize = "jb_job_number"),
        default
    )]
    pub job_number: i64,
    #[serde(rename(deserialize = "JAT_prio", serialize = "jat_prio"), default)]
    pub priority: f64,
    #[serde(rename(deserialize = "JB_name", serialize = "jb_name"), default)]
    pub name: String,
    #[serde(rename(deserialize = "JB_owner", serialize = "jb_owner"), default)]
    pub owner: String,
    #[serde(
        rename(deserialize = "JAT_start_time", serialize = "start_time"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<String>,
    #[serde(
        rename(deserialize = "JB_submission_time", serialize = "submitted_time"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub submitted_time: Option<String>,
    #[serde(default)]
    pub slots: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Task>,
}

impl Job {
    pub fn is_running(&self) -> bool {
        self.state == "r"
    }

    /// Discrete bad states, or any state code carrying an `E`/`e` component
    pub fn is_in_error_state(&self) -> bool {
        ERROR_STATES.contains(&self.state.as_str())
            || self.state.contains('E')
            || self.state.contains('e')
    }

    fn task_source(&self) -> &str {
        self.tasks.as_ref().map(|t| t.source.as_str()).unwrap_or("")
    }

    pub fn has_task_range(&self) -> bool {
        TASK_RANGE.is_match(self.task_source())
    }

    pub fn has_task_group(&self) -> bool {
        self.task_source().contains(',')
    }

    /// Split a job carrying a task range or group into one job per task.
    pub fn expand_tasks(&self) -> Result<JobList, GridError> {
        let source = self.task_source();
        let mut expanded = Vec::new();

        if let Some(caps) = TASK_RANGE.captures(source) {
            let begin: i64 = caps[1].parse()?;
            let end: i64 = caps[2].parse()?;
            let step: i64 = caps[3].parse()?;

            if step == 0 {
                return Err(GridError::Parse(format!(
                    "task range '{}' has a zero step",
                    source
                )));
            }

            if end >= begin {
                let count = (end as i128 - begin as i128) / step as i128 + 1;
                if count > MAX_EXPANDED_TASKS {
                    return Err(GridError::Parse(format!(
                        "task range '{}' expands to {} tasks, more than {}",
                        source, count, MAX_EXPANDED_TASKS
                    )));
                }
                expanded.reserve(count as usize);
            }

            let mut id = begin;
            while id <= end {
                expanded.push(self.with_task_id(id));
                id = match id.checked_add(step) {
                    Some(next) => next,
                    None => break,
                };
            }
        } else if source.contains(',') {
            for piece in source.split(',') {
                let id: i64 = piece.trim().parse()?;
                expanded.push(self.with_task_id(id));
            }
        } else {
            return Err(GridError::InvalidTaskRange);
        }

        Ok(JobList(expanded))
    }

    fn with_task_id(&self, id: i64) -> Job {
        let mut job = self.clone();
        if let Some(tasks) = job.tasks.as_mut() {
            tasks.task_id = Some(id);
        }
        job
    }

    /// Ordering by job number, then task id
    pub fn cmp_by_number_and_task(&self, other: &Job) -> Ordering {
        let task = |j: &Job| j.tasks.as_ref().and_then(|t| t.task_id);
        self.job_number
            .cmp(&other.job_number)
            .then_with(|| task(self).cmp(&task(other)))
    }
}

/// A list of jobs that can be filtered and sorted fluently
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(transparent)]
pub struct JobList(pub Vec<Job>);

impl JobList {
    pub fn filter<F>(self, filter: F) -> JobList
    where
        F: Fn(&Job) -> bool,
    {
        JobList(self.0.into_iter().filter(|j| filter(j)).collect())
    }

    pub fn sort_by<F>(mut self, compare: F) -> JobList
    where
        F: FnMut(&Job, &Job) -> Ordering,
    {
        self.0.sort_by(compare);
        self
    }

    pub fn into_inner(self) -> Vec<Job> {
        self.0
    }
}

impl Deref for JobList {
    type Target = Vec<Job>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for JobList {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<Job>> for JobList {
    fn from(jobs: Vec<Job>) -> Self {
        Self(jobs)
    }
}

impl IntoIterator for JobList {
    type Item = Job;
    type IntoIter = std::vec::IntoIter<Job>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Filter a borrowed list without consuming it
pub fn filter_jobs<F>(jobs: &JobList, filter: F) -> JobList
where
    F: Fn(&Job) -> bool,
{
    JobList(jobs.iter().filter(|j| filter(j)).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_tasks(number: i64, tasks: &str) -> Job {
        Job {
            job_number: number,
            state: "qw".to_string(),
            tasks: Some(Task::from(tasks.to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn test_deserialize_job() {
        let source = r#"<job_list state="running">
    <JB_job_number>4291</JB_job_number>
    <JAT_prio>0.50500</JAT_prio>
    <JB_name>Run487</JB_name>
    <JB_owner>ahmede</JB_owner>
    <state>r</state>
    <JAT_start_time>2019-09-15T15:26:36</JAT_start_time>
    <slots>1</slots>
</job_list>"#;

        let job: Job = quick_xml::de::from_str(source).unwrap();
        assert_eq!(job.job_number, 4291);
        assert!((job.priority - 0.505).abs() < f64::EPSILON);
        assert_eq!(job.name, "Run487");
        assert_eq!(job.owner, "ahmede");
        assert_eq!(job.state_attribute, "running");
        assert_eq!(job.start_time.as_deref(), Some("2019-09-15T15:26:36"));
        assert_eq!(job.submitted_time, None);
        assert_eq!(job.slots, 1);
        assert!(job.is_running());
    }

    #[test]
    fn test_task_id_only_for_single_tasks() {
        assert_eq!(Task::from("7".to_string()).task_id, Some(7));
        assert_eq!(Task::from("1-10:1".to_string()).task_id, None);
        assert_eq!(Task::from("1,2".to_string()).task_id, None);
    }

    #[test]
    fn test_error_states() {
        let mut job = Job::default();
        for (state, bad) in [("r", false), ("qw", false), ("Eqw", true), ("dt", true), ("auo", true), ("hqw", false)] {
            job.state = state.to_string();
            assert_eq!(job.is_in_error_state(), bad, "state {}", state);
        }
    }

    #[test]
    fn test_expand_range() {
        let job = job_with_tasks(10, "1-10:3");
        assert!(job.has_task_range());
        assert!(!job.has_task_group());

        let expanded = job.expand_tasks().unwrap();
        let ids: Vec<i64> = expanded
            .iter()
            .map(|j| j.tasks.as_ref().unwrap().task_id.unwrap())
            .collect();
        assert_eq!(ids, vec![1, 4, 7, 10]);
        assert!(expanded.iter().all(|j| j.job_number == 10));
    }

    #[test]
    fn test_expand_group() {
        let job = job_with_tasks(11, "2,5,9");
        assert!(job.has_task_group());

        let expanded = job.expand_tasks().unwrap();
        assert_eq!(expanded.len(), 3);
        assert_eq!(expanded[2].tasks.as_ref().unwrap().task_id, Some(9));
    }

    #[test]
    fn test_expand_rejects_plain_and_bad_input() {
        assert!(matches!(
            job_with_tasks(1, "4").expand_tasks(),
            Err(GridError::InvalidTaskRange)
        ));
        assert!(matches!(
            Job::default().expand_tasks(),
            Err(GridError::InvalidTaskRange)
        ));
        assert!(job_with_tasks(1, "1-5:0").expand_tasks().is_err());
        assert!(job_with_tasks(1, "1,x").expand_tasks().is_err());
    }

    #[test]
    fn test_expand_range_at_integer_limit() {
        let job = job_with_tasks(1, "9223372036854775806-9223372036854775807:5");
        let expanded = job.expand_tasks().unwrap();

        assert_eq!(expanded.len(), 1);
        assert_eq!(
            expanded[0].tasks.as_ref().unwrap().task_id,
            Some(9_223_372_036_854_775_806)
        );
    }

    #[test]
    fn test_expand_rejects_oversized_range() {
        assert!(matches!(
            job_with_tasks(1, "1-4000000000:1").expand_tasks(),
            Err(GridError::Parse(_))
        ));

        // Large bounds with a wide step stay small
        let sparse = job_with_tasks(1, "1-4000000000:1000000000").expand_tasks().unwrap();
        assert_eq!(sparse.len(), 4);
    }

    #[test]
    fn test_filter_and_sort() {
        let jobs = JobList(vec![
            job_with_tasks(3, "1"),
            job_with_tasks(1, "2"),
            job_with_tasks(2, "1"),
            job_with_tasks(1, "1"),
        ]);

        let sorted = jobs.clone().sort_by(Job::cmp_by_number_and_task);
        let order: Vec<(i64, Option<i64>)> = sorted
            .iter()
            .map(|j| (j.job_number, j.tasks.as_ref().unwrap().task_id))
            .collect();
        assert_eq!(order, vec![(1, Some(1)), (1, Some(2)), (2, Some(1)), (3, Some(1))]);

        let ones = filter_jobs(&jobs, |j| j.job_number == 1);
        assert_eq!(ones.len(), 2);
        assert_eq!(jobs.len(), 4);

        let empty = jobs.filter(|_| false);
        assert!(empty.is_empty());
    }
}
