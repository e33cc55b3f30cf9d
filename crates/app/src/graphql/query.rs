use async_graphql::{Context, Object, Result, ID};

use jobboard_core::{ApplicationScope, JobFilter};

use super::types::{ApplicationObject, JobObject, UserObject};
use super::{actor, board, not_found, parse_id, to_graphql_error};

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn user(&self, ctx: &Context<'_>, id: ID) -> Result<Option<UserObject>> {
        let Some(id) = parse_id(&id) else {
            return Ok(None);
        };
        let user = board(ctx)?
            .service
            .get_user(id)
            .await
            .map_err(to_graphql_error)?;
        Ok(user.map(UserObject))
    }

    /// Administrators only.
    async fn users(&self, ctx: &Context<'_>) -> Result<Vec<UserObject>> {
        let users = board(ctx)?
            .service
            .list_users(actor(ctx))
            .await
            .map_err(to_graphql_error)?;
        Ok(users.into_iter().map(UserObject).collect())
    }

    async fn job(&self, ctx: &Context<'_>, id: ID) -> Result<Option<JobObject>> {
        let Some(id) = parse_id(&id) else {
            return Ok(None);
        };
        let job = board(ctx)?
            .service
            .get_job(id)
            .await
            .map_err(to_graphql_error)?;
        Ok(job.map(JobObject))
    }

    /// Case-insensitive substring filters, newest first.
    async fn jobs(
        &self,
        ctx: &Context<'_>,
        location: Option<String>,
        category: Option<String>,
        company: Option<String>,
    ) -> Result<Vec<JobObject>> {
        let jobs = board(ctx)?
            .service
            .list_jobs(JobFilter {
                location,
                category,
                company,
            })
            .await
            .map_err(to_graphql_error)?;
        Ok(jobs.into_iter().map(JobObject).collect())
    }

    async fn application(&self, ctx: &Context<'_>, id: ID) -> Result<Option<ApplicationObject>> {
        let Some(id) = parse_id(&id) else {
            return Ok(None);
        };
        let application = board(ctx)?
            .service
            .get_application(actor(ctx), id)
            .await
            .map_err(to_graphql_error)?;
        Ok(application.map(ApplicationObject))
    }

    /// Every application; administrators only.
    async fn applications(&self, ctx: &Context<'_>) -> Result<Vec<ApplicationObject>> {
        list(ctx, ApplicationScope::All).await
    }

    async fn my_applications(&self, ctx: &Context<'_>) -> Result<Vec<ApplicationObject>> {
        list(ctx, ApplicationScope::Mine).await
    }

    async fn job_applications(
        &self,
        ctx: &Context<'_>,
        job_id: ID,
    ) -> Result<Vec<ApplicationObject>> {
        let job_id = parse_id(&job_id).ok_or_else(|| to_graphql_error(not_found("Job")))?;
        list(ctx, ApplicationScope::ForJob(job_id)).await
    }
}

async fn list(ctx: &Context<'_>, scope: ApplicationScope) -> Result<Vec<ApplicationObject>> {
    let applications = board(ctx)?
        .service
        .list_applications(actor(ctx), scope)
        .await
        .map_err(to_graphql_error)?;
    Ok(applications.into_iter().map(ApplicationObject).collect())
}
