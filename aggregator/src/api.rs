use crate::Services;
use crate::auth::AuthUser;
use crate::cla_groups::{
    ClaGroupOutput, ClaGroupValidation, CreateClaGroupInput, FoundationMapping,
};
use crate::composition::{
    ActiveCla, CompanyClaManager, CompanyOutput, CompanyProjectClaList, CorporateContributor,
};
use crate::config::Listener;
use crate::errors::Result;
use crate::metrics::{
    ClaManagerDistributionView, CompanyMetricView, DashboardMetrics, ProjectMetricView,
    TOP_COMPANIES, TopCompanies, TotalCountView,
};
use crate::metrics_defs::API_REQUESTS;
use axum::{
    Json, Router,
    extract::{MatchedPath, Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use shared::counter;
use store::events::Event;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub fn router(services: Services) -> Router {
    let v4 = Router::new()
        .route("/metrics", get(get_metrics))
        .route("/metrics/top-companies", get(get_top_companies))
        .route("/metrics/total-count", get(get_total_count))
        .route("/metrics/companies", get(list_company_metrics))
        .route(
            "/metrics/cla-manager-distribution",
            get(get_cla_manager_distribution),
        )
        .route("/company-metric/{company_id}", get(get_company_metric))
        .route("/project-metric/{project_id}", get(get_project_metric))
        .route("/company", post(create_company))
        // The segment after company/ is the internal id, except for the cla
        // and contributors routes which take the external organization id.
        .route(
            "/company/{company_id}/project/{project_sfid}/cla-managers",
            get(get_cla_managers),
        )
        .route(
            "/company/{company_id}/project/{project_sfid}/active-clas",
            get(get_active_clas),
        )
        .route(
            "/company/{company_id}/project/{project_sfid}/cla",
            get(get_company_project_cla),
        )
        .route(
            "/company/{company_id}/project/{project_sfid}/contributors",
            get(get_contributors),
        )
        .route(
            "/company/{company_id}/project/{project_sfid}/events",
            get(get_recent_events),
        )
        .route(
            "/company/{company_id}/cla-group/{cla_group_id}/cla-managers",
            get(get_cla_group_managers),
        )
        .route("/cla-group", post(create_cla_group))
        .route("/cla-group/validate", post(validate_cla_group))
        .route(
            "/cla-group/{cla_group_id}/enroll-projects",
            put(enroll_projects),
        )
        .route("/cla-group/{cla_group_id}", delete(delete_cla_group))
        .route(
            "/foundation/{foundation_sfid}/cla-groups",
            get(get_foundation_cla_groups),
        )
        .route("/foundation-mapping", get(get_foundation_mapping))
        .route_layer(middleware::from_fn(record_request));

    Router::new().nest("/v4", v4).with_state(services)
}

pub async fn serve(listener: &Listener, services: Services) -> Result<(), ApiError> {
    let app = router(services);

    let addr = format!("{}:{}", listener.host, listener.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "api listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn record_request(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_default();
    let response = next.run(request).await;
    let status = response.status().as_u16().to_string();
    counter!(API_REQUESTS, "route" => route, "status" => status).increment(1);
    response
}

async fn get_metrics(State(services): State<Services>) -> Json<DashboardMetrics> {
    Json(services.metrics.get_metrics().await)
}

async fn get_top_companies(State(services): State<Services>) -> Result<Json<TopCompanies>> {
    Ok(Json(services.metrics.get_top_companies().await?))
}

async fn get_total_count(State(services): State<Services>) -> Result<Json<TotalCountView>> {
    Ok(Json(services.metrics.get_total_count_metrics().await?))
}

async fn get_cla_manager_distribution(
    State(services): State<Services>,
) -> Result<Json<ClaManagerDistributionView>> {
    Ok(Json(services.metrics.get_cla_manager_distribution().await?))
}

#[derive(Deserialize, Debug)]
struct CompanyMetricsParams {
    pinned_company_id: Option<String>,
    top_n: Option<usize>,
}

async fn list_company_metrics(
    State(services): State<Services>,
    Query(params): Query<CompanyMetricsParams>,
) -> Result<Json<Vec<CompanyMetricView>>> {
    let rows = services
        .metrics
        .list_company_metrics(
            params.pinned_company_id.as_deref(),
            params.top_n.unwrap_or(TOP_COMPANIES),
        )
        .await?;
    Ok(Json(rows))
}

async fn get_company_metric(
    State(services): State<Services>,
    Path(company_id): Path<String>,
) -> Result<Json<CompanyMetricView>> {
    Ok(Json(services.metrics.get_company_metric(&company_id).await?))
}

async fn get_project_metric(
    State(services): State<Services>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectMetricView>> {
    Ok(Json(services.metrics.get_project_metric(&project_id).await?))
}

async fn get_cla_managers(
    State(services): State<Services>,
    Path((company_id, project_sfid)): Path<(String, String)>,
) -> Result<Json<Vec<CompanyClaManager>>> {
    Ok(Json(services.companies.cla_managers(&company_id, &project_sfid).await?))
}

async fn get_active_clas(
    State(services): State<Services>,
    Path((company_id, project_sfid)): Path<(String, String)>,
) -> Result<Json<Vec<ActiveCla>>> {
    Ok(Json(services.companies.active_clas(&company_id, &project_sfid).await?))
}

async fn get_company_project_cla(
    State(services): State<Services>,
    auth_user: AuthUser,
    Path((company_sfid, project_sfid)): Path<(String, String)>,
) -> Result<Json<CompanyProjectClaList>> {
    let list = services
        .companies
        .company_project_cla(&auth_user, &company_sfid, &project_sfid)
        .await?;
    Ok(Json(list))
}

#[derive(Deserialize, Debug)]
struct ContributorParams {
    search_term: Option<String>,
}

async fn get_contributors(
    State(services): State<Services>,
    Path((company_sfid, project_sfid)): Path<(String, String)>,
    Query(params): Query<ContributorParams>,
) -> Result<Json<Vec<CorporateContributor>>> {
    let contributors = services
        .companies
        .contributors(&project_sfid, &company_sfid, params.search_term.as_deref())
        .await?;
    Ok(Json(contributors))
}

async fn get_cla_group_managers(
    State(services): State<Services>,
    Path((company_id, cla_group_id)): Path<(String, String)>,
) -> Result<Json<Vec<CompanyClaManager>>> {
    Ok(Json(
        services
            .companies
            .cla_group_managers(&company_id, &cla_group_id)
            .await?,
    ))
}

#[derive(Deserialize, Debug)]
struct EventParams {
    page_size: Option<usize>,
}

async fn get_recent_events(
    State(services): State<Services>,
    Path((company_id, project_sfid)): Path<(String, String)>,
    Query(params): Query<EventParams>,
) -> Result<Json<Vec<Event>>> {
    let events = services
        .events
        .get_recent_events_for_company_project(&company_id, &project_sfid, params.page_size)
        .await?;
    Ok(Json(events))
}

#[derive(Deserialize, Debug)]
struct CreateCompanyInput {
    company_name: String,
    #[serde(default)]
    company_website: String,
}

async fn create_company(
    State(services): State<Services>,
    auth_user: AuthUser,
    Json(input): Json<CreateCompanyInput>,
) -> Result<Json<CompanyOutput>> {
    let company = services
        .companies
        .create_company(&input.company_name, &input.company_website, &auth_user.username)
        .await?;
    Ok(Json(company))
}

async fn create_cla_group(
    State(services): State<Services>,
    auth_user: AuthUser,
    Json(input): Json<CreateClaGroupInput>,
) -> Result<Json<ClaGroupOutput>> {
    Ok(Json(
        services
            .cla_groups
            .create_cla_group(input, &auth_user.username)
            .await?,
    ))
}

#[derive(Deserialize, Debug)]
struct ValidateClaGroupInput {
    cla_group_name: Option<String>,
}

async fn validate_cla_group(
    State(services): State<Services>,
    Json(input): Json<ValidateClaGroupInput>,
) -> Json<ClaGroupValidation> {
    Json(
        services
            .cla_groups
            .validate_cla_group(input.cla_group_name.as_deref())
            .await,
    )
}

#[derive(Deserialize, Debug)]
struct EnrollProjectsInput {
    foundation_sfid: String,
    project_sfid_list: Vec<String>,
}

async fn enroll_projects(
    State(services): State<Services>,
    Path(cla_group_id): Path<String>,
    Json(input): Json<EnrollProjectsInput>,
) -> Result<StatusCode> {
    services
        .cla_groups
        .enroll_projects_in_cla_group(
            &cla_group_id,
            &input.foundation_sfid,
            &input.project_sfid_list,
        )
        .await?;
    Ok(StatusCode::OK)
}

async fn delete_cla_group(
    State(services): State<Services>,
    Path(cla_group_id): Path<String>,
) -> Result<StatusCode> {
    services.cla_groups.delete_cla_group(&cla_group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_foundation_cla_groups(
    State(services): State<Services>,
    Path(foundation_sfid): Path<String>,
) -> Result<Json<Vec<ClaGroupOutput>>> {
    Ok(Json(
        services
            .cla_groups
            .list_cla_groups_for_foundation(&foundation_sfid)
            .await?,
    ))
}

#[derive(Deserialize, Debug)]
struct FoundationMappingParams {
    foundation_sfid: Option<String>,
}

async fn get_foundation_mapping(
    State(services): State<Services>,
    Query(params): Query<FoundationMappingParams>,
) -> Result<Json<Vec<FoundationMapping>>> {
    Ok(Json(
        services
            .cla_groups
            .list_all_foundation_cla_groups(params.foundation_sfid.as_deref())
            .await?,
    ))
}
