use std::sync::Arc;

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use secrecy::ExposeSecret;
use validator::Validate;

use crate::{
    app_state::AppState,
    config::Config,
    errors::AppError,
    middleware::get_request_id,
    models::{
        domain::SolveRun,
        dto::{request::QuizRequestDto, response::TaskAcceptedResponse},
    },
    services::SolveRequest,
};

fn check_secret(config: &Config, secret: &str) -> Result<(), AppError> {
    match &config.quiz_secret {
        Some(expected) if expected.expose_secret() != secret => {
            Err(AppError::Forbidden("Invalid secret".to_string()))
        }
        Some(_) => Ok(()),
        None => {
            log::warn!("QUIZ_SECRET not configured, accepting request without verification");
            Ok(())
        }
    }
}

#[post("/")]
pub async fn solve_quiz(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<QuizRequestDto>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();
    request.validate()?;
    check_secret(&state.config, &request.secret)?;

    let run = state
        .runs
        .create(SolveRun::new(&request.email, &request.url))
        .await?;
    log::info!(
        "[{}] Received task for {} at {} (run {})",
        get_request_id(&req).unwrap_or_default(),
        request.email,
        request.url,
        run.run_id
    );

    let solver = Arc::clone(&state.solver);
    let solve_request = SolveRequest {
        run_id: run.run_id.clone(),
        start_url: request.url,
        email: request.email,
        secret: request.secret,
    };
    actix_web::rt::spawn(async move {
        solver.solve(solve_request).await;
    });

    Ok(HttpResponse::Ok().json(TaskAcceptedResponse::new(run.run_id)))
}

#[get("/runs/{run_id}")]
pub async fn get_run(
    state: web::Data<AppState>,
    run_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let run = state
        .runs
        .get(&run_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Run with id '{}' not found", run_id)))?;
    Ok(HttpResponse::Ok().json(run))
}
