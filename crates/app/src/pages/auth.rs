use axum::{
    extract::{Multipart, Query, State},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, info};

use jobboard_core::{DomainError, NewUser, Role, UploadKind, UserUpdate};

use super::views::{LoginPage, ProfilePage, RegisterPage, RoleOption};
use super::{discard_upload_on_error, layout, redirect_with, render, PageError, PageResult};
use crate::files::FormData;
use crate::flash::Flash;
use crate::router::AppState;
use crate::service::ServiceError;
use crate::session::CurrentUser;

pub async fn register_form(current: CurrentUser, jar: CookieJar) -> PageResult {
    if current.user.is_some() {
        return redirect_with(jar, "/", Vec::new());
    }
    let (jar, layout) = layout("Register", &current, jar);
    render(
        jar,
        RegisterPage {
            layout,
            roles: RoleOption::for_registration(),
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    username: String,
    email: String,
    password: String,
    confirm_password: String,
    #[serde(default)]
    role: String,
}

pub async fn register(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> PageResult {
    if current.user.is_some() {
        return redirect_with(jar, "/", Vec::new());
    }
    if form.password != form.confirm_password {
        return Err(PageError::redirect(
            "/register",
            Flash::danger("Passwords must match"),
        ));
    }
    let role = match form.role.trim() {
        "" => Role::JobSeeker,
        raw => raw
            .parse::<Role>()
            .map_err(|err| PageError::from_service(err.into(), "/register"))?,
    };

    state
        .service()
        .create_user(
            current.actor,
            NewUser {
                username: form.username,
                email: form.email,
                password: form.password,
                role,
                profile_picture: None,
            },
        )
        .await
        .map_err(|err| PageError::from_service(err, "/register"))?;

    redirect_with(
        jar,
        "/login",
        vec![Flash::success(
            "Your account has been created! You can now log in.",
        )],
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    next: Option<String>,
}

pub async fn login_form(
    current: CurrentUser,
    jar: CookieJar,
    Query(query): Query<NextQuery>,
) -> PageResult {
    if current.user.is_some() {
        return redirect_with(jar, "/", Vec::new());
    }
    let (jar, layout) = layout("Login", &current, jar);
    render(
        jar,
        LoginPage {
            layout,
            next: query.next.unwrap_or_default(),
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
    #[serde(default)]
    next: Option<String>,
}

/// Only same-site absolute paths are followed after login.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/",
    }
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> PageResult {
    let user = match state
        .service()
        .authenticate(form.email.trim(), &form.password)
        .await
    {
        Ok(user) => user,
        Err(ServiceError::Domain(DomainError::Authentication(_))) => {
            return Err(PageError::redirect(
                "/login",
                Flash::danger("Login unsuccessful. Please check email and password"),
            ));
        }
        Err(err) => return Err(PageError::from_service(err, "/login")),
    };

    let token = state.sessions().issue(&user, state.now()).map_err(|err| {
        error!(stage = "pages", error = %err, "failed to issue session");
        PageError::Internal
    })?;
    info!(stage = "pages", user_id = user.id, "user logged in");

    let jar = jar.add(state.sessions().cookie(token));
    redirect_with(
        jar,
        safe_next(form.next.as_deref()),
        vec![Flash::success("Login successful!")],
    )
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> PageResult {
    let jar = jar.remove(state.sessions().removal_cookie());
    redirect_with(jar, "/", vec![Flash::info("You have been logged out.")])
}

pub async fn profile(current: CurrentUser, jar: CookieJar, State(state): State<AppState>) -> PageResult {
    let Some(user) = current.user.clone() else {
        return Err(PageError::login_required());
    };
    let (jar, layout) = layout("Account", &current, jar);
    render(
        jar,
        ProfilePage {
            layout,
            picture_url: state
                .signer()
                .sign_optional(user.profile_picture.as_deref(), state.now())
                .unwrap_or_default(),
            username: user.username,
            email: user.email,
            role: user.role.label(),
        },
    )
}

pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    multipart: Multipart,
) -> PageResult {
    let Some(user) = current.user.as_ref() else {
        return Err(PageError::login_required());
    };
    let mut form = FormData::read(multipart)
        .await
        .map_err(|err| PageError::bad_form(err, "/profile"))?;

    let profile_picture = match form.take_file("picture") {
        Some(file) => Some(
            state
                .service()
                .store_upload(current.actor, UploadKind::ProfilePicture, &file.filename, &file.bytes)
                .await
                .map_err(|err| PageError::from_service(err, "/profile"))?,
        ),
        None => None,
    };

    let update = UserUpdate {
        username: form.text("username").filter(|name| *name != user.username),
        email: form.text("email").filter(|email| *email != user.email),
        profile_picture: profile_picture.clone(),
        ..Default::default()
    };
    if update.is_empty() {
        return redirect_with(jar, "/profile", vec![Flash::info("Nothing to update.")]);
    }

    let result = state.service().update_user(current.actor, user.id, update).await;
    discard_upload_on_error(&state, profile_picture.as_deref(), result)
        .await
        .map_err(|err| PageError::from_service(err, "/profile"))?;

    redirect_with(
        jar,
        "/profile",
        vec![Flash::success("Your account has been updated!")],
    )
}
