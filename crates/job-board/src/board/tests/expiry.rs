use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::Duration;

use super::common::*;
use crate::board::domain::{Actor, InterviewStatus, JobQuery};
use crate::board::expiry::{CleanupStage, ExpiryCollector, SweepError};
use crate::board::repository::BoardStores;
use crate::board::service::{BoardError, InterviewRequest};

fn interview_request() -> InterviewRequest {
    InterviewRequest {
        date_time: t0() + Duration::days(3),
        meeting_link: Some("https://meet.example.com/route".to_string()),
    }
}

#[test]
fn sweep_removes_expired_jobs_with_dependents_and_keeps_live_ones() {
    for_each_backend(|backend, stores| {
        let service = service_with(stores.clone());
        let (expired, application) = seed_application(&service);
        service
            .schedule_interview(
                &employer(),
                &application.id,
                &expired.id,
                &seeker().user_id,
                interview_request(),
            )
            .expect("interview scheduled");

        let later = t0() + Duration::days(60);
        let live = service
            .post_job(&employer(), posting("Dispatcher"), later)
            .expect("live job posts");
        let live_application = service
            .apply(&seeker(), &live.id, submission("Sana"), later)
            .expect("live application");

        let now = expired.expiry_date + Duration::hours(1);
        let report = service.sweep_expired_jobs(now).expect("sweep runs");

        assert_eq!(report.removed_jobs, vec![expired.id.clone()], "{backend}");
        assert_eq!(report.applications_removed, 1);
        assert_eq!(report.interviews_removed, 1);
        assert!(!report.is_partial());

        assert!(stores.jobs.fetch(&expired.id).unwrap().is_none());
        assert!(stores.applications.fetch(&application.id).unwrap().is_none());
        assert!(stores.interviews.list_by_job(&expired.id).unwrap().is_empty());
        assert!(stores.jobs.fetch(&live.id).unwrap().is_some());
        assert!(stores
            .applications
            .fetch(&live_application.id)
            .unwrap()
            .is_some());
    });
}

#[test]
fn job_expiring_exactly_now_is_swept() {
    for_each_backend(|backend, stores| {
        let owner = employer().user_id;
        let boundary = stores
            .jobs
            .insert(job_expiring("Boundary", &owner, t0()))
            .unwrap();
        let tomorrow = stores
            .jobs
            .insert(job_expiring("Tomorrow", &owner, t0() + Duration::days(1)))
            .unwrap();

        let report = service_with(stores.clone())
            .sweep_expired_jobs(t0())
            .expect("sweep runs");

        assert_eq!(report.removed_jobs, vec![boundary.id], "{backend}");
        assert_eq!(
            all_jobs(&stores)
                .into_iter()
                .map(|job| job.id)
                .collect::<Vec<_>>(),
            vec![tomorrow.id]
        );
    });
}

#[test]
fn sweep_ignores_mutual_consent_flags() {
    let (service, _) = build_service();
    let (job, application) = seed_application(&service);
    service
        .delete_application(&employer(), &application.id)
        .expect("employer hides application");

    let report = service
        .sweep_expired_jobs(job.expiry_date)
        .expect("sweep runs");

    assert_eq!(report.applications_removed, 1);
    assert!(service
        .stores()
        .applications
        .fetch(&application.id)
        .unwrap()
        .is_none());
}

#[test]
fn failure_on_one_job_does_not_stop_the_rest() {
    let (base, _) = memory_stores();
    let owner = employer().user_id;
    let stuck = base
        .jobs
        .insert(job_expiring("Stuck", &owner, t0() - Duration::days(2)))
        .unwrap();
    let other = base
        .jobs
        .insert(job_expiring("Other", &owner, t0() - Duration::days(1)))
        .unwrap();
    let stores = BoardStores {
        applications: Arc::new(StuckApplications {
            inner: base.applications.clone(),
            stuck_job: stuck.id.clone(),
        }),
        ..base
    };

    let report = service_with(stores.clone())
        .sweep_expired_jobs(t0())
        .expect("sweep completes");

    assert!(report.is_partial());
    assert_eq!(report.removed_jobs, vec![other.id.clone()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].job_id, stuck.id);
    assert_eq!(report.failures[0].stage, CleanupStage::Applications);
    assert!(report.failures[0].reason.contains("write lock timeout"));

    // dependents failed first, so the job itself was left alone
    assert!(stores.jobs.fetch(&stuck.id).unwrap().is_some());
    assert!(stores.jobs.fetch(&other.id).unwrap().is_none());
}

#[test]
fn sweeping_twice_is_a_no_op() {
    let (service, _) = build_service();
    let (job, _) = seed_application(&service);

    let first = service.sweep_expired_jobs(job.expiry_date).unwrap();
    let second = service.sweep_expired_jobs(job.expiry_date).unwrap();

    assert_eq!(first.removed_count(), 1);
    assert_eq!(second.removed_count(), 0);
    assert_eq!(second.applications_removed, 0);
    assert!(second.failures.is_empty());
}

#[test]
fn sweep_with_nothing_expired_reports_empty() {
    let (service, _) = build_service();
    seed_application(&service);

    let report = service.sweep_expired_jobs(t0()).unwrap();
    assert_eq!(report.swept_at, t0());
    assert_eq!(report.removed_count(), 0);
    assert_eq!(service.list_jobs(&JobQuery::default()).unwrap().len(), 1);
}

#[test]
fn overlapping_sweeps_are_rejected() {
    let (base, _) = memory_stores();
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let gated = Arc::new(GatedJobs {
        inner: base.jobs.clone(),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let collector = Arc::new(ExpiryCollector::new(
        gated,
        base.applications.clone(),
        base.interviews.clone(),
        base.saved.clone(),
    ));

    let background = {
        let collector = Arc::clone(&collector);
        thread::spawn(move || collector.sweep(t0()))
    };
    entered_rx.recv().expect("first sweep started");

    assert!(collector.is_running());
    assert!(matches!(
        collector.sweep(t0()),
        Err(SweepError::AlreadyRunning)
    ));

    release_tx.send(()).expect("release first sweep");
    background
        .join()
        .expect("sweep thread finished")
        .expect("first sweep succeeds");
    assert!(!collector.is_running());
}

#[test]
fn store_outage_fails_the_whole_sweep() {
    let (base, _) = memory_stores();
    let stores = BoardStores {
        jobs: Arc::new(UnavailableJobs),
        ..base
    };
    let service = service_with(stores);

    match service.sweep_expired_jobs(t0()) {
        Err(BoardError::Store(_)) => {}
        other => panic!("expected store error, got {other:?}"),
    }
    assert!(!service.sweep_in_progress());
}

#[test]
fn cancelled_interviews_still_go_with_their_job() {
    let (service, _) = build_service();
    let (job, application) = seed_application(&service);
    let interview = service
        .schedule_interview(
            &employer(),
            &application.id,
            &job.id,
            &seeker().user_id,
            interview_request(),
        )
        .unwrap();
    service
        .update_interview_status(&employer(), &interview.id, InterviewStatus::Rejected)
        .unwrap();

    let report = service.sweep_expired_jobs(job.expiry_date).unwrap();
    assert_eq!(report.interviews_removed, 1);
    assert!(service
        .stores()
        .interviews
        .fetch(&interview.id)
        .unwrap()
        .is_none());
}

#[test]
fn sweep_drops_saved_entries_for_removed_jobs() {
    for_each_backend(|backend, stores| {
        let service = service_with(stores.clone());
        let (expired, _) = seed_application(&service);
        let live = service
            .post_job(&employer(), posting("Dispatcher"), t0() + Duration::days(60))
            .unwrap();
        service.save_job(&seeker(), &expired.id).unwrap();
        service.save_job(&seeker(), &live.id).unwrap();

        let report = service.sweep_expired_jobs(expired.expiry_date).unwrap();

        assert_eq!(report.saved_removed, 1, "{backend}");
        assert_eq!(stores.saved.list_saved(&seeker().user_id).unwrap(), vec![live.id.clone()]);
    });
}

#[test]
fn application_filed_during_owner_deletion_is_removed_with_the_job() {
    for_each_backend(|backend, base| {
        let (gate, entered, release) = Gate::new();
        let stores = BoardStores {
            interviews: Arc::new(GatedInterviews {
                inner: base.interviews.clone(),
                gate,
            }),
            ..base
        };
        let service = Arc::new(service_with(stores.clone()));
        let job = service
            .post_job(&employer(), posting("Route Planner"), t0())
            .unwrap();

        let deletion = {
            let service = Arc::clone(&service);
            let job_id = job.id.clone();
            thread::spawn(move || service.delete_job(&employer(), &job_id))
        };
        entered.recv().expect("cascade reached interviews");

        // applications are already cleared but the job row is still there
        let late = service
            .apply(&seeker(), &job.id, submission("Sana"), t0())
            .expect("job is still visible to applicants");
        release.send(()).expect("release the cascade");
        deletion
            .join()
            .expect("deletion thread finished")
            .expect("owner deletes");

        assert!(stores.jobs.fetch(&job.id).unwrap().is_none(), "{backend}");
        assert!(stores.applications.fetch(&late.id).unwrap().is_none(), "{backend}");
        assert!(service.seeker_applications(&seeker()).unwrap().is_empty());
    });
}

#[test]
fn interview_scheduled_during_sweep_goes_with_the_job() {
    for_each_backend(|backend, base| {
        let (gate, entered, release) = Gate::new();
        let stores = BoardStores {
            saved: Arc::new(GatedSaved {
                inner: base.saved.clone(),
                gate,
            }),
            ..base
        };
        let service = Arc::new(service_with(stores.clone()));
        let (job, _) = seed_application(&service);

        let sweep = {
            let service = Arc::clone(&service);
            let now = job.expiry_date;
            thread::spawn(move || service.sweep_expired_jobs(now))
        };
        entered.recv().expect("cascade reached saved jobs");

        let latecomer = Actor::job_seeker("seeker-2");
        let application = service
            .apply(&latecomer, &job.id, submission("Omar"), t0())
            .expect("job row still present");
        let interview = service
            .schedule_interview(
                &employer(),
                &application.id,
                &job.id,
                &latecomer.user_id,
                interview_request(),
            )
            .expect("interview scheduled");
        release.send(()).expect("release the sweep");

        let report = sweep
            .join()
            .expect("sweep thread finished")
            .expect("sweep runs");
        assert_eq!(report.removed_jobs, vec![job.id.clone()], "{backend}");
        assert_eq!(report.applications_removed, 2, "{backend}");
        assert_eq!(report.interviews_removed, 1, "{backend}");
        assert!(stores.interviews.fetch(&interview.id).unwrap().is_none());
        assert!(stores.applications.fetch(&application.id).unwrap().is_none());
        assert!(stores.interviews.list_by_job(&job.id).unwrap().is_empty());
    });
}
