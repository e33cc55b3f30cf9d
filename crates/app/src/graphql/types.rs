use async_graphql::{Context, InputObject, Object, Result, SimpleObject, ID};

use jobboard_core::{Application, ApplicationScope, Job, User};

use super::{actor, board, to_graphql_error};

pub fn id_of(id: i64) -> ID {
    ID(id.to_string())
}

pub struct UserObject(pub User);

#[Object(name = "User")]
impl UserObject {
    async fn id(&self) -> ID {
        id_of(self.0.id)
    }

    async fn username(&self) -> &str {
        &self.0.username
    }

    async fn email(&self) -> &str {
        &self.0.email
    }

    async fn role(&self) -> &str {
        self.0.role.as_str()
    }

    async fn profile_picture(&self) -> Option<&str> {
        self.0.profile_picture.as_deref()
    }

    /// Short-lived signed link to the profile picture.
    async fn profile_picture_url(&self, ctx: &Context<'_>) -> Result<Option<String>> {
        let board = board(ctx)?;
        Ok(board.sign(self.0.profile_picture.as_deref()))
    }

    async fn created_at(&self) -> String {
        self.0.created_at.to_rfc3339()
    }

    async fn jobs_posted(&self, ctx: &Context<'_>) -> Result<Vec<JobObject>> {
        let jobs = board(ctx)?
            .service
            .jobs_posted_by(self.0.id)
            .await
            .map_err(to_graphql_error)?;
        Ok(jobs.into_iter().map(JobObject).collect())
    }

    /// Visible to the user themselves and to admins.
    async fn applications(&self, ctx: &Context<'_>) -> Result<Vec<ApplicationObject>> {
        let applications = board(ctx)?
            .service
            .applications_of(actor(ctx), self.0.id)
            .await
            .map_err(to_graphql_error)?;
        Ok(applications.into_iter().map(ApplicationObject).collect())
    }
}

pub struct JobObject(pub Job);

#[Object(name = "Job")]
impl JobObject {
    async fn id(&self) -> ID {
        id_of(self.0.id)
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn description(&self) -> &str {
        &self.0.description
    }

    async fn salary(&self) -> Option<&str> {
        self.0.salary.as_deref()
    }

    async fn location(&self) -> &str {
        &self.0.location
    }

    async fn category(&self) -> &str {
        &self.0.category
    }

    async fn company(&self) -> &str {
        &self.0.company
    }

    async fn company_logo(&self) -> Option<&str> {
        self.0.company_logo.as_deref()
    }

    async fn company_logo_url(&self, ctx: &Context<'_>) -> Result<Option<String>> {
        Ok(board(ctx)?.sign(self.0.company_logo.as_deref()))
    }

    async fn posted_date(&self) -> String {
        self.0.posted_at.to_rfc3339()
    }

    async fn poster(&self, ctx: &Context<'_>) -> Result<UserObject> {
        board(ctx)?
            .service
            .get_user(self.0.poster_id)
            .await
            .map_err(to_graphql_error)?
            .map(UserObject)
            .ok_or_else(|| "Poster not found".into())
    }

    /// Only the owner and admins may list a posting's applications.
    async fn applications(&self, ctx: &Context<'_>) -> Result<Vec<ApplicationObject>> {
        let applications = board(ctx)?
            .service
            .list_applications(actor(ctx), ApplicationScope::ForJob(self.0.id))
            .await
            .map_err(to_graphql_error)?;
        Ok(applications.into_iter().map(ApplicationObject).collect())
    }

    async fn application_count(&self, ctx: &Context<'_>) -> Result<i64> {
        board(ctx)?
            .service
            .application_count(self.0.id)
            .await
            .map_err(to_graphql_error)
    }
}

pub struct ApplicationObject(pub Application);

#[Object(name = "Application")]
impl ApplicationObject {
    async fn id(&self) -> ID {
        id_of(self.0.id)
    }

    async fn job(&self, ctx: &Context<'_>) -> Result<JobObject> {
        board(ctx)?
            .service
            .get_job(self.0.job_id)
            .await
            .map_err(to_graphql_error)?
            .map(JobObject)
            .ok_or_else(|| "Job not found".into())
    }

    async fn applicant(&self, ctx: &Context<'_>) -> Result<UserObject> {
        board(ctx)?
            .service
            .get_user(self.0.applicant_id)
            .await
            .map_err(to_graphql_error)?
            .map(UserObject)
            .ok_or_else(|| "Applicant not found".into())
    }

    async fn application_date(&self) -> String {
        self.0.applied_at.to_rfc3339()
    }

    async fn status(&self) -> &str {
        self.0.status.as_str()
    }

    async fn resume_path(&self) -> Option<&str> {
        self.0.resume_path.as_deref()
    }

    async fn resume_url(&self, ctx: &Context<'_>) -> Result<Option<String>> {
        Ok(board(ctx)?.sign(self.0.resume_path.as_deref()))
    }
}

#[derive(InputObject)]
pub struct UserInput {
    pub username: String,
    pub email: String,
    pub password: String,
    /// `job_seeker` when omitted.
    pub role: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(InputObject)]
pub struct UserUpdateInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(InputObject)]
#[graphql(name = "JobInput")]
pub struct JobInputObject {
    pub title: String,
    pub description: String,
    pub salary: Option<String>,
    pub location: String,
    pub category: String,
    pub company: String,
    pub company_logo: Option<String>,
    /// Admins may post on behalf of an employer.
    pub poster_id: Option<ID>,
}

#[derive(InputObject)]
pub struct JobUpdateInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub salary: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub company: Option<String>,
    pub company_logo: Option<String>,
}

#[derive(InputObject)]
pub struct ApplicationInput {
    pub job_id: ID,
    pub resume_path: Option<String>,
}

#[derive(SimpleObject)]
pub struct UserPayload {
    pub user: Option<UserObject>,
    pub errors: Vec<String>,
}

#[derive(SimpleObject)]
pub struct JobPayload {
    pub job: Option<JobObject>,
    pub errors: Vec<String>,
}

#[derive(SimpleObject)]
pub struct ApplicationPayload {
    pub application: Option<ApplicationObject>,
    pub errors: Vec<String>,
}

#[derive(SimpleObject)]
pub struct DeletePayload {
    pub success: bool,
    pub errors: Vec<String>,
}
