use async_graphql::{Context, Object, Result, ID};

use jobboard_core::{Application, Job, JobInput, JobUpdate, NewUser, Role, User, UserUpdate};

use super::types::{
    ApplicationInput, ApplicationObject, ApplicationPayload, DeletePayload, JobInputObject,
    JobObject, JobPayload, JobUpdateInput, UserInput, UserObject, UserPayload, UserUpdateInput,
};
use super::{actor, board, error_messages, not_found, parse_id};
use crate::service::ServiceResult;

#[derive(Default)]
pub struct MutationRoot;

fn require_id(id: &ID, what: &str) -> ServiceResult<i64> {
    parse_id(id).ok_or_else(|| not_found(what))
}

fn parse_role(raw: Option<&str>) -> ServiceResult<Option<Role>> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Ok(Some(raw.parse()?)),
        None => Ok(None),
    }
}

fn user_payload(result: ServiceResult<User>) -> UserPayload {
    match result {
        Ok(user) => UserPayload {
            user: Some(UserObject(user)),
            errors: Vec::new(),
        },
        Err(err) => UserPayload {
            user: None,
            errors: error_messages(err),
        },
    }
}

fn job_payload(result: ServiceResult<Job>) -> JobPayload {
    match result {
        Ok(job) => JobPayload {
            job: Some(JobObject(job)),
            errors: Vec::new(),
        },
        Err(err) => JobPayload {
            job: None,
            errors: error_messages(err),
        },
    }
}

fn application_payload(result: ServiceResult<Application>) -> ApplicationPayload {
    match result {
        Ok(application) => ApplicationPayload {
            application: Some(ApplicationObject(application)),
            errors: Vec::new(),
        },
        Err(err) => ApplicationPayload {
            application: None,
            errors: error_messages(err),
        },
    }
}

fn delete_payload(result: ServiceResult<()>) -> DeletePayload {
    match result {
        Ok(()) => DeletePayload {
            success: true,
            errors: Vec::new(),
        },
        Err(err) => DeletePayload {
            success: false,
            errors: error_messages(err),
        },
    }
}

#[Object]
impl MutationRoot {
    /// Self registration, or account creation by an administrator.
    async fn create_user(&self, ctx: &Context<'_>, input: UserInput) -> Result<UserPayload> {
        let service = &board(ctx)?.service;
        let result = match parse_role(input.role.as_deref()) {
            Ok(role) => {
                service
                    .create_user(
                        actor(ctx),
                        NewUser {
                            username: input.username,
                            email: input.email,
                            password: input.password,
                            role: role.unwrap_or(Role::JobSeeker),
                            profile_picture: input.profile_picture,
                        },
                    )
                    .await
            }
            Err(err) => Err(err),
        };
        Ok(user_payload(result))
    }

    async fn update_user(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: UserUpdateInput,
    ) -> Result<UserPayload> {
        let service = &board(ctx)?.service;
        let result = match (require_id(&id, "User"), parse_role(input.role.as_deref())) {
            (Ok(id), Ok(role)) => {
                service
                    .update_user(
                        actor(ctx),
                        id,
                        UserUpdate {
                            username: input.username,
                            email: input.email,
                            password: input.password,
                            role,
                            profile_picture: input.profile_picture,
                        },
                    )
                    .await
            }
            (Err(err), _) | (_, Err(err)) => Err(err),
        };
        Ok(user_payload(result))
    }

    async fn delete_user(&self, ctx: &Context<'_>, id: ID) -> Result<DeletePayload> {
        let service = &board(ctx)?.service;
        let result = match require_id(&id, "User") {
            Ok(id) => service.delete_user(actor(ctx), id).await,
            Err(err) => Err(err),
        };
        Ok(delete_payload(result))
    }

    async fn create_job(&self, ctx: &Context<'_>, input: JobInputObject) -> Result<JobPayload> {
        let service = &board(ctx)?.service;
        let owner = input
            .poster_id
            .as_ref()
            .map(|id| require_id(id, "User"))
            .transpose();
        let result = match owner {
            Ok(owner) => {
                service
                    .create_job(
                        actor(ctx),
                        JobInput {
                            title: input.title,
                            description: input.description,
                            salary: input.salary,
                            location: input.location,
                            category: input.category,
                            company: input.company,
                            company_logo: input.company_logo,
                        },
                        owner,
                    )
                    .await
            }
            Err(err) => Err(err),
        };
        Ok(job_payload(result))
    }

    async fn update_job(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: JobUpdateInput,
    ) -> Result<JobPayload> {
        let service = &board(ctx)?.service;
        let update = JobUpdate {
            title: input.title,
            description: input.description,
            salary: input.salary,
            location: input.location,
            category: input.category,
            company: input.company,
            company_logo: input.company_logo,
        };
        let result = match require_id(&id, "Job") {
            Ok(id) => service.update_job(actor(ctx), id, update).await,
            Err(err) => Err(err),
        };
        Ok(job_payload(result))
    }

    /// Removes the posting and every application to it.
    async fn delete_job(&self, ctx: &Context<'_>, id: ID) -> Result<DeletePayload> {
        let service = &board(ctx)?.service;
        let result = match require_id(&id, "Job") {
            Ok(id) => service.delete_job(actor(ctx), id).await,
            Err(err) => Err(err),
        };
        Ok(delete_payload(result))
    }

    async fn create_application(
        &self,
        ctx: &Context<'_>,
        input: ApplicationInput,
    ) -> Result<ApplicationPayload> {
        let service = &board(ctx)?.service;
        let result = match require_id(&input.job_id, "Job") {
            Ok(job_id) => {
                service
                    .create_application(actor(ctx), job_id, input.resume_path)
                    .await
            }
            Err(err) => Err(err),
        };
        Ok(application_payload(result))
    }

    async fn update_application_status(
        &self,
        ctx: &Context<'_>,
        id: ID,
        status: String,
    ) -> Result<ApplicationPayload> {
        let service = &board(ctx)?.service;
        let result = match require_id(&id, "Application") {
            Ok(id) => {
                service
                    .update_application_status(actor(ctx), id, &status)
                    .await
            }
            Err(err) => Err(err),
        };
        Ok(application_payload(result))
    }

    async fn delete_application(&self, ctx: &Context<'_>, id: ID) -> Result<DeletePayload> {
        let service = &board(ctx)?.service;
        let result: ServiceResult<()> = match require_id(&id, "Application") {
            Ok(id) => service.delete_application(actor(ctx), id).await,
            Err(err) => Err(err),
        };
        Ok(delete_payload(result))
    }
}
