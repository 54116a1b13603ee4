use crate::infra::LoggingNotifier;
use chrono::{Duration, Utc};
use clap::Args;
use job_board::board::{
    Actor, ApplicationSubmission, BoardStores, DeletionOutcome, InterviewRequest,
    JobBoardService, JobPosting, MemoryDocumentStore, ResumeRef, SweepReport, ValidityPeriod,
};
use job_board::error::AppError;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the expiry sweep at the end of the walkthrough.
    #[arg(long)]
    pub(crate) skip_sweep: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let stores = BoardStores::from_backend(Arc::new(MemoryDocumentStore::new()));
    let service = JobBoardService::new(stores, Arc::new(LoggingNotifier));

    let employer = Actor::employer("demo-employer");
    let amna = Actor::job_seeker("demo-seeker-amna");
    let bilal = Actor::job_seeker("demo-seeker-bilal");

    // backdated so the sweep at the end has something to collect
    let posted_on = Utc::now() - Duration::days(120);
    let job = service.post_job(&employer, sample_posting(), posted_on)?;
    println!("== Job board demo ==");
    println!(
        "Posted \"{}\" ({}) on {}, expires {}",
        job.title,
        job.id,
        job.posted_on.format("%Y-%m-%d"),
        job.expiry_date.format("%Y-%m-%d")
    );

    service.save_job(&bilal, &job.id)?;
    let first = service.apply(&amna, &job.id, sample_submission("Amna"), posted_on)?;
    let second = service.apply(&bilal, &job.id, sample_submission("Bilal"), posted_on)?;
    service.schedule_interview(
        &employer,
        &second.id,
        &job.id,
        &bilal.user_id,
        InterviewRequest {
            date_time: posted_on + Duration::days(5),
            meeting_link: Some("https://meet.example.com/demo".to_string()),
        },
    )?;
    println!(
        "Applications received: {} | applicants on job: {}",
        service.employer_applications(&employer)?.len(),
        service.get_job(&job.id)?.applicants.len()
    );

    println!();
    println!("-- Mutual-consent removal --");
    let outcome = service.delete_application(&employer, &first.id)?;
    println!("Employer removes Amna's application: {}", describe(&outcome));
    println!(
        "  employer sees {} application(s); Amna still sees {}",
        service.employer_applications(&employer)?.len(),
        service.seeker_applications(&amna)?.len()
    );

    let outcome = service.delete_application(&amna, &first.id)?;
    println!("Amna removes it too: {}", describe(&outcome));
    println!(
        "  applicants left on job: {}",
        service.get_job(&job.id)?.applicants.len()
    );

    if args.skip_sweep {
        return Ok(());
    }

    println!();
    println!("-- Expiry sweep --");
    let report = service.sweep_expired_jobs(Utc::now())?;
    render_sweep(&report);
    let again = service.sweep_expired_jobs(Utc::now())?;
    println!(
        "Second sweep removed {} job(s) (sweeps are idempotent)",
        again.removed_count()
    );
    Ok(())
}

fn describe(outcome: &DeletionOutcome) -> String {
    match outcome {
        DeletionOutcome::PartiallyReleased { by, deleted_by } => format!(
            "hidden for {:?} only (employer flag: {}, seeker flag: {})",
            by, deleted_by.employer, deleted_by.job_seeker
        ),
        DeletionOutcome::Released => "released by both parties and deleted".to_string(),
    }
}

fn render_sweep(report: &SweepReport) {
    println!(
        "Removed {} expired job(s), {} application(s), {} interview(s), {} saved job(s)",
        report.removed_count(),
        report.applications_removed,
        report.interviews_removed,
        report.saved_removed
    );
    for failure in &report.failures {
        println!(
            "  cleanup failed for {} at {:?}: {}",
            failure.job_id, failure.stage, failure.reason
        );
    }
}

fn sample_posting() -> JobPosting {
    JobPosting {
        title: "Warehouse Lead".to_string(),
        job_type: "Full-time".to_string(),
        location: "Islamabad".to_string(),
        company_name: "Northwind Traders".to_string(),
        introduction: "Run the night shift at our central depot.".to_string(),
        responsibilities: "Coordinate pickers and loaders.".to_string(),
        qualifications: "Three years in warehouse operations.".to_string(),
        offers: Some("Transport allowance".to_string()),
        salary: "85000".to_string(),
        hiring_multiple_candidates: false,
        personal_website: None,
        job_niche: "Operations".to_string(),
        validity_period: ValidityPeriod::ThreeMonths,
    }
}

fn sample_submission(name: &str) -> ApplicationSubmission {
    let slug = name.to_lowercase();
    ApplicationSubmission {
        name: name.to_string(),
        email: format!("{slug}@example.com"),
        phone: "0300-0000000".to_string(),
        address: "Blue Area, Islamabad".to_string(),
        cover_letter: "I have led similar teams before.".to_string(),
        resume: Some(ResumeRef {
            public_id: format!("resumes/{slug}"),
            url: format!("https://files.example.com/resumes/{slug}.pdf"),
        }),
    }
}
