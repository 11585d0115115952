//! The root `job_info` document produced by `qstat -F -xml`.

use crate::error::GridError;
use crate::grid::host::{Host, PendingJobs, QueueInfo};
use crate::grid::job::{Job, JobList};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Everything qstat reported at one point in time: scheduled queue
/// instances with their running jobs, and the pending job list.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename = "job_info")]
pub struct JobInfo {
    #[serde(default)]
    pub queue_info: QueueInfo,
    #[serde(rename(deserialize = "job_info", serialize = "pending_jobs"), default)]
    pub pending_jobs: PendingJobs,
}

impl JobInfo {
    /// Parse qstat XML output, expanding pending array tasks into one job
    /// per task.
    pub fn from_xml(input: &str) -> Result<Self, GridError> {
        let mut info: JobInfo = quick_xml::de::from_str(input)?;
        info.expand_pending_tasks();
        Ok(info)
    }

    /// Replace pending array jobs with one job per task. When anything was
    /// expanded the pending list ends up ordered by job number and task id.
    pub fn expand_pending_tasks(&mut self) {
        let pending = std::mem::take(&mut self.pending_jobs.job_list);
        let mut expanded_any = false;
        let mut jobs = Vec::with_capacity(pending.len());

        for job in pending {
            if !(job.has_task_range() || job.has_task_group()) {
                jobs.push(job);
                continue;
            }

            match job.expand_tasks() {
                Ok(tasks) => {
                    debug!(
                        job_number = job.job_number,
                        tasks = tasks.len(),
                        "Expanded pending task array"
                    );
                    expanded_any = true;
                    jobs.extend(tasks);
                }
                Err(e) => {
                    error!(
                        job_number = job.job_number,
                        error = %e,
                        "Failed to expand task range into job list"
                    );
                    jobs.push(job);
                }
            }
        }

        if expanded_any {
            jobs.sort_by(Job::cmp_by_number_and_task);
        }

        self.pending_jobs.job_list = jobs;
    }

    /// Running jobs (host by host) followed by pending jobs
    pub fn jobs(&self) -> JobList {
        self.queue_info
            .queues
            .iter()
            .flat_map(|host| host.job_list.iter())
            .chain(self.pending_jobs.job_list.iter())
            .cloned()
            .collect::<Vec<_>>()
            .into()
    }

    pub fn hosts(&self) -> &[Host] {
        &self.queue_info.queues
    }

    pub fn pending(&self) -> &[Job] {
        &self.pending_jobs.job_list
    }

    pub fn is_empty(&self) -> bool {
        self.queue_info.queues.is_empty() && self.pending_jobs.job_list.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QSTAT_XML: &str = r#"<?xml version='1.0'?>
<job_info  xmlns:xsd="http://arc.liv.ac.uk/repos/darcs/sge/source/dist/util/resources/schemas/qstat/qstat.xsd">
  <queue_info>
    <Queue-List>
      <name>all.q@magicalhostname</name>
      <qtype>BIP</qtype>
      <slots_used>32</slots_used>
      <slots_resv>0</slots_resv>
      <slots_total>36</slots_total>
      <load_avg>31.63000</load_avg>
      <arch>lx-amd64</arch>
      <resource name="load_avg" type="hl">31.630000</resource>
      <resource name="load_short" type="hl">31.700000</resource>
      <resource name="num_proc" type="hl">36</resource>
      <resource name="mem_free" type="hl">57.353G</resource>
      <resource name="swap_free" type="hl">0.000</resource>
      <resource name="m_socket" type="hl">2</resource>
      <job_list state="running">
        <JB_job_number>4291</JB_job_number>
        <JAT_prio>0.50500</JAT_prio>
        <JB_name>Run487</JB_name>
        <JB_owner>ahmede</JB_owner>
        <state>r</state>
        <JAT_start_time>2019-09-15T15:26:36</JAT_start_time>
        <slots>1</slots>
      </job_list>
      <job_list state="running">
        <JB_job_number>4292</JB_job_number>
        <JAT_prio>0.50500</JAT_prio>
        <JB_name>Run488</JB_name>
        <JB_owner>ahmede</JB_owner>
        <state>r</state>
        <JAT_start_time>2019-09-15T15:27:36</JAT_start_time>
        <slots>1</slots>
        <tasks>3</tasks>
      </job_list>
    </Queue-List>
    <Queue-List>
      <name>all.q@emptyhost</name>
      <qtype>BIP</qtype>
      <slots_used>0</slots_used>
      <slots_resv>0</slots_resv>
      <slots_total>4</slots_total>
      <load_avg>0.01000</load_avg>
    </Queue-List>
  </queue_info>
  <job_info>
    <job_list state="pending">
      <JB_job_number>5000</JB_job_number>
      <JAT_prio>0.00000</JAT_prio>
      <JB_name>ArrayRun</JB_name>
      <JB_owner>devinp</JB_owner>
      <state>qw</state>
      <JB_submission_time>2019-09-26T10:17:37</JB_submission_time>
      <slots>1</slots>
      <tasks>1-5:2</tasks>
    </job_list>
    <job_list state="pending">
      <JB_job_number>3517</JB_job_number>
      <JAT_prio>0.55500</JAT_prio>
      <JB_name>Run1417</JB_name>
      <JB_owner>devinp</JB_owner>
      <state>Eqw</state>
      <JB_submission_time>2019-09-26T10:17:37</JB_submission_time>
      <slots>1</slots>
    </job_list>
    <job_list state="pending">
      <JB_job_number>4999</JB_job_number>
      <JAT_prio>0.00000</JAT_prio>
      <JB_name>GroupRun</JB_name>
      <JB_owner>devinp</JB_owner>
      <state>qw</state>
      <slots>1</slots>
      <tasks>8,9</tasks>
    </job_list>
  </job_info>
</job_info>"#;

    #[test]
    fn test_parse_hosts_and_resources() {
        let info = JobInfo::from_xml(QSTAT_XML).unwrap();

        assert_eq!(info.hosts().len(), 2);
        let host = &info.hosts()[0];
        assert_eq!(host.name, "all.q@magicalhostname");
        assert_eq!(host.hostname(), "magicalhostname");
        assert_eq!(host.queue(), "all.q");
        assert_eq!(host.slots_used, 32);
        assert_eq!(host.slots_total, 36);
        assert!((host.load_average - 31.63).abs() < 1e-9);
        assert_eq!(host.resources.len(), 6);
        assert_eq!(host.resources.processor_count().unwrap(), 36);
        assert_eq!(host.resources.socket_count().unwrap(), 2);
        assert_eq!(host.job_list.len(), 2);
        assert_eq!(host.job_list[1].tasks.as_ref().unwrap().task_id, Some(3));

        assert!(info.hosts()[1].job_list.is_empty());
        assert!(info.hosts()[1].resources.is_empty());
    }

    #[test]
    fn test_pending_tasks_are_expanded_and_sorted() {
        let info = JobInfo::from_xml(QSTAT_XML).unwrap();

        let pending: Vec<(i64, Option<i64>)> = info
            .pending()
            .iter()
            .map(|j| (j.job_number, j.tasks.as_ref().and_then(|t| t.task_id)))
            .collect();

        assert_eq!(
            pending,
            vec![
                (3517, None),
                (4999, Some(8)),
                (4999, Some(9)),
                (5000, Some(1)),
                (5000, Some(3)),
                (5000, Some(5)),
            ]
        );
        assert!(info.pending()[0].is_in_error_state());
    }

    #[test]
    fn test_jobs_lists_running_before_pending() {
        let info = JobInfo::from_xml(QSTAT_XML).unwrap();
        let jobs = info.jobs();

        assert_eq!(jobs.len(), 8);
        assert!(jobs[0].is_running());
        assert!(jobs[1].is_running());
        assert_eq!(jobs.iter().filter(|j| j.is_running()).count(), 2);
    }

    #[test]
    fn test_empty_document() {
        let info = JobInfo::from_xml("<job_info><queue_info/><job_info/></job_info>").unwrap();
        assert!(info.is_empty());
        assert!(info.jobs().is_empty());
    }

    #[test]
    fn test_malformed_document() {
        let result = JobInfo::from_xml("<job_info><queue_info>");
        assert!(matches!(result, Err(GridError::Parse(_))));
    }

    #[test]
    fn test_json_uses_api_field_names() {
        let info = JobInfo::from_xml(QSTAT_XML).unwrap();
        let json = serde_json::to_value(&info).unwrap();

        let job = &json["queue_info"]["queue_list"][0]["job_list"][0];
        assert_eq!(job["jb_job_number"], 4291);
        assert_eq!(job["state_attribute_text"], "running");
        assert!(json["pending_jobs"]["job_list"].is_array());
    }
}
