//! Job filter predicates.
//!
//! Constructors validate their inputs up front and return a boxed predicate
//! usable with [`JobList::filter`](crate::grid::JobList::filter).
//! Time filters compare against the job's ISO-8601 timestamps; jobs without a
//! parsable timestamp never match.

use crate::error::GridError;
use crate::grid::job::Job;
use chrono::NaiveDateTime;

/// Timestamp layout used by qstat for start and submission times
pub const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub type JobFilter = Box<dyn Fn(&Job) -> bool + Send + Sync>;

pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime, GridError> {
    NaiveDateTime::parse_from_str(input.trim(), ISO8601_FORMAT).map_err(|e| {
        GridError::InvalidFilter(format!("'{}' is not an ISO 8601 time: {}", input, e))
    })
}

fn non_empty_inputs(inputs: &[String], what: &str) -> Result<Vec<String>, GridError> {
    if inputs.is_empty() {
        return Err(GridError::InvalidFilter(format!(
            "no {} were provided upon which to operate",
            what
        )));
    }
    if inputs.iter().any(|v| v.is_empty()) {
        return Err(GridError::InvalidFilter(format!(
            "one of the provided {} was empty",
            what
        )));
    }
    Ok(inputs.to_vec())
}

/// Jobs owned by any of `owners`
pub fn owner_filter(owners: &[String]) -> Result<JobFilter, GridError> {
    let owners = non_empty_inputs(owners, "owners")?;
    Ok(Box::new(move |job: &Job| owners.iter().any(|o| *o == job.owner)))
}

/// Jobs whose state code contains any of `states` (e.g. `h` matches `hqw`)
pub fn state_filter(states: &[String]) -> Result<JobFilter, GridError> {
    let states = non_empty_inputs(states, "states")?;
    Ok(Box::new(move |job: &Job| {
        states.iter().any(|s| job.state.contains(s.as_str()))
    }))
}

pub fn starting_job_number_filter(first: i64) -> JobFilter {
    Box::new(move |job: &Job| job.job_number >= first)
}

fn time_filter<F>(field: fn(&Job) -> Option<&str>, accept: F) -> JobFilter
where
    F: Fn(NaiveDateTime) -> bool + Send + Sync + 'static,
{
    Box::new(move |job: &Job| {
        field(job)
            .and_then(|raw| NaiveDateTime::parse_from_str(raw, ISO8601_FORMAT).ok())
            .map(&accept)
            .unwrap_or(false)
    })
}

fn submitted(job: &Job) -> Option<&str> {
    job.submitted_time.as_deref()
}

fn started(job: &Job) -> Option<&str> {
    job.start_time.as_deref()
}

pub fn submitted_before(t: NaiveDateTime) -> JobFilter {
    time_filter(submitted, move |jt| jt < t)
}

pub fn submitted_after(t: NaiveDateTime) -> JobFilter {
    time_filter(submitted, move |jt| jt > t)
}

pub fn submitted_between(start: NaiveDateTime, end: NaiveDateTime) -> JobFilter {
    time_filter(submitted, move |jt| jt > start && jt < end)
}

pub fn started_before(t: NaiveDateTime) -> JobFilter {
    time_filter(started, move |jt| jt < t)
}

pub fn started_after(t: NaiveDateTime) -> JobFilter {
    time_filter(started, move |jt| jt > t)
}

pub fn started_between(start: NaiveDateTime, end: NaiveDateTime) -> JobFilter {
    time_filter(started, move |jt| jt > start && jt < end)
}

/// Combine filters; a job must pass every one. No filters accepts everything.
pub fn all_of(filters: Vec<JobFilter>) -> JobFilter {
    Box::new(move |job: &Job| filters.iter().all(|f| f(job)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::job::JobList;

    fn job(number: i64, owner: &str, state: &str, start: &str, submitted: &str) -> Job {
        Job {
            job_number: number,
            owner: owner.to_string(),
            state: state.to_string(),
            start_time: Some(start.to_string()),
            submitted_time: Some(submitted.to_string()),
            ..Default::default()
        }
    }

    fn job_list() -> JobList {
        JobList(vec![
            job(10, "janed", "h", "notavalidtime", "notavalidtime"),
            job(11, "johnd", "r", "2019-01-13T11:21:15", "2018-01-13T11:21:15"),
            job(12, "johnd", "r", "2019-01-14T11:21:15", "2018-01-14T11:21:15"),
            job(13, "jilld", "eh", "2019-01-14T11:21:17", "2018-01-14T11:21:17"),
            job(14, "janed", "h", "2019-01-14T11:34:15", "2018-01-14T11:34:15"),
            job(15, "joed", "qw", "2019-01-15T08:34:15", "2018-01-15T08:34:15"),
            job(16, "janed", "h", "2019-01-15T23:34:15", "2018-01-15T23:34:15"),
        ])
    }

    fn numbers(jobs: &JobList) -> Vec<i64> {
        let mut n: Vec<i64> = jobs.iter().map(|j| j.job_number).collect();
        n.sort_unstable();
        n
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_owner_filter() {
        let filter = owner_filter(&strings(&["janed", "jilld"])).unwrap();
        assert_eq!(numbers(&job_list().filter(filter)), vec![10, 13, 14, 16]);

        assert!(owner_filter(&[]).is_err());
        assert!(owner_filter(&strings(&["janed", ""])).is_err());
    }

    #[test]
    fn test_state_filter() {
        let filter = state_filter(&strings(&["e", "h"])).unwrap();
        assert_eq!(numbers(&job_list().filter(filter)), vec![10, 13, 14, 16]);

        assert!(state_filter(&[]).is_err());
    }

    #[test]
    fn test_starting_job_number_filter() {
        let jobs = job_list().filter(starting_job_number_filter(13));
        assert_eq!(numbers(&jobs), vec![13, 14, 15, 16]);
    }

    #[test]
    fn test_submission_time_filters() {
        let before = job_list().filter(submitted_before(ts("2018-01-14T11:21:15")));
        assert_eq!(numbers(&before), vec![11]);

        let after = job_list().filter(submitted_after(ts("2018-01-14T11:21:15")));
        assert_eq!(numbers(&after), vec![13, 14, 15, 16]);

        let between = job_list().filter(submitted_between(
            ts("2018-01-13T00:00:00"),
            ts("2018-01-14T11:30:00"),
        ));
        assert_eq!(numbers(&between), vec![11, 12, 13]);
    }

    #[test]
    fn test_start_time_filters() {
        let before = job_list().filter(started_before(ts("2019-01-14T11:21:15")));
        assert_eq!(numbers(&before), vec![11]);

        let after = job_list().filter(started_after(ts("2019-01-14T11:21:15")));
        assert_eq!(numbers(&after), vec![13, 14, 15, 16]);

        let between = job_list().filter(started_between(
            ts("2019-01-14T11:21:15"),
            ts("2019-01-15T00:00:00"),
        ));
        assert_eq!(numbers(&between), vec![13, 14]);
    }

    #[test]
    fn test_jobs_without_times_never_match() {
        let jobs = JobList(vec![Job {
            job_number: 1,
            ..Default::default()
        }]);
        assert!(jobs.clone().filter(started_after(ts("2000-01-01T00:00:00"))).is_empty());
        assert!(jobs.filter(submitted_before(ts("2100-01-01T00:00:00"))).is_empty());
    }

    #[test]
    fn test_invalid_timestamp_input() {
        assert!(matches!(
            parse_timestamp("notavalidtime"),
            Err(GridError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_all_of() {
        let filter = all_of(vec![
            owner_filter(&strings(&["janed"])).unwrap(),
            starting_job_number_filter(14),
        ]);
        assert_eq!(numbers(&job_list().filter(filter)), vec![14, 16]);

        assert_eq!(job_list().filter(all_of(vec![])).len(), 7);
    }
}
