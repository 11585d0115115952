use crate::cache::SnapshotSource;
use crate::error::GridError;
use crate::grid::{Host, Job, JobInfo, PendingJobs, QueueInfo, Resource, ResourceList, Task};
use rand::Rng;

/// Job number that every generated snapshot carries
pub const VALIDATION_JOB_NUMBER: i64 = 44;

/// Randomized snapshots for running without a grid engine.
///
/// Every fetch yields two hosts, three running jobs (one of them the fixed
/// validation job) and a pending array job, with numbers that change from
/// one fetch to the next.
#[derive(Debug, Clone, Default)]
pub struct GeneratedSource;

impl GeneratedSource {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self) -> JobInfo {
        let mut rng = rand::thread_rng();

        let running = |rng: &mut rand::rngs::ThreadRng, number: i64, name: String| Job {
            state_attribute: "running".to_string(),
            state: "r".to_string(),
            job_number: number,
            priority: rng.gen(),
            name,
            owner: format!("Owner-{}", rng.gen_range(1..10_000)),
            slots: 3,
            ..Default::default()
        };

        let first_job = rng.gen_range(1_000..1_000_000);
        let main_host = Host {
            name: "all.q@testing.local".to_string(),
            qtype: "BIP".to_string(),
            slots_total: 36,
            slots_used: rng.gen_range(0..=36),
            slots_reserved: rng.gen_range(0..4),
            load_average: rng.gen_range(0.0..36.0),
            resources: ResourceList(vec![
                resource("load_avg", "hl", "1.04"),
                resource("num_proc", "hl", "3"),
                resource("mem_free", "hl", "2.04G"),
                resource("swap_free", "hl", "500M"),
                resource("virtual_free", "hl", "4G"),
                resource("mem_used", "hl", "3G"),
                resource("mem_total", "hl", "6G"),
                resource("cpu", "hl", &format!("{:.6}", rng.gen_range(0.0..100.0))),
            ]),
            job_list: vec![
                running(&mut rng, first_job, format!("Job-{}", first_job)),
                running(&mut rng, VALIDATION_JOB_NUMBER, "validation".to_string()),
            ],
        };

        let second_host = Host {
            name: "all.q@testing.second".to_string(),
            qtype: "BIP".to_string(),
            slots_total: 16,
            slots_used: 14,
            job_list: vec![Job {
                state_attribute: "running".to_string(),
                state: "r".to_string(),
                job_number: 1,
                priority: 1.0,
                name: "Second-Host-Job".to_string(),
                owner: "Owner".to_string(),
                slots: 14,
                ..Default::default()
            }],
            ..Default::default()
        };

        let pending_job = first_job + 1;
        let mut info = JobInfo {
            queue_info: QueueInfo {
                queues: vec![main_host, second_host],
            },
            pending_jobs: PendingJobs {
                job_list: vec![Job {
                    state_attribute: "pending".to_string(),
                    state: "qw".to_string(),
                    job_number: pending_job,
                    priority: rng.gen(),
                    name: format!("Job-{}", pending_job),
                    owner: format!("Owner-{}", rng.gen_range(1..10_000)),
                    slots: 3,
                    tasks: Some(Task::from(format!("1-{}:1", rng.gen_range(1..4)))),
                    ..Default::default()
                }],
            },
        };

        info.expand_pending_tasks();
        info
    }
}

fn resource(name: &str, kind: &str, value: &str) -> Resource {
    Resource {
        name: name.to_string(),
        kind: kind.to_string(),
        value: value.to_string(),
    }
}

impl SnapshotSource<JobInfo> for GeneratedSource {
    fn name(&self) -> &'static str {
        "generated"
    }

    async fn fetch(&self) -> Result<JobInfo, GridError> {
        Ok(self.generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_snapshot_shape() {
        let info = GeneratedSource::new().fetch().await.unwrap();

        assert_eq!(info.hosts().len(), 2);
        assert_eq!(info.hosts()[0].hostname(), "testing.local");
        assert_eq!(info.hosts()[1].hostname(), "testing.second");

        let jobs = info.jobs();
        assert!(jobs
            .iter()
            .any(|j| j.job_number == VALIDATION_JOB_NUMBER && j.name == "validation"));
        assert_eq!(jobs.iter().filter(|j| j.is_running()).count(), 3);
        assert!(!info.pending().is_empty());
        assert!(info.pending().iter().all(|j| j.state == "qw"));
    }

    #[test]
    fn test_pending_array_is_expanded() {
        let info = GeneratedSource::new().generate();
        let ids: Vec<Option<i64>> = info
            .pending()
            .iter()
            .map(|j| j.tasks.as_ref().and_then(|t| t.task_id))
            .collect();

        assert!(ids.first() == Some(&Some(1)));
        assert!(ids.iter().all(|id| id.is_some()));
    }

    #[test]
    fn test_resources_are_readable() {
        let info = GeneratedSource::new().generate();
        let resources = &info.hosts()[0].resources;

        assert_eq!(resources.processor_count().unwrap(), 3);
        assert!((resources.free_memory().unwrap().bytes - 2_040_000_000).abs() <= 1);
        assert!(resources.cpu().is_ok());
    }
}
