use crate::{
    Result,
    app::query_api::{
        Query,
        QueryAPI,
        SaveOutcome,
    },
};
use actix_cors::Cors;
use actix_web::{
    App,
    HttpResponse,
    HttpServer,
    dev::ServerHandle,
    error::ErrorInternalServerError,
    web,
};
use anyhow::{
    Context,
    anyhow,
};
use roulette::CountryId;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    net::TcpListener,
    thread::JoinHandle,
};
use tokio::sync::{
    mpsc,
    oneshot,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct CountriesParams {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct CountriesDto {
    countries: Vec<CountryId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct SaveCountriesRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    countries: Vec<CountryId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct SavedDto {
    ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct ErrorDto {
    error: String,
}

impl ErrorDto {
    fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// Port the server listens on unless told otherwise; clients dial it by default.
pub const DEFAULT_PORT: u16 = 8787;

pub struct ActixQueryApi {
    receiver: mpsc::Receiver<Query>,
    base_url: String,
    server_handle: ServerHandle,
    server_thread: Option<JoinHandle<()>>,
}

impl ActixQueryApi {
    /// `None` binds an ephemeral port.
    pub async fn new(port: Option<u16>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel(16);

        let listener = TcpListener::bind(("127.0.0.1", port.unwrap_or(0)))
            .context("failed to bind HTTP listener for selection API")?;
        let address = listener
            .local_addr()
            .context("failed to read listener address")?;
        let base_url = format!("http://{}", address);

        tracing::info!("selection API listening on {}", base_url);

        let server = HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .app_data(web::Data::new(sender.clone()))
                .route("/countries", web::get().to(handle_countries))
                .route("/countries", web::post().to(handle_save_countries))
        })
        .listen(listener)
        .context("failed to start Actix server")?
        .run();

        let server_handle = server.handle();
        let server_thread = std::thread::spawn(move || {
            let sys = actix_web::rt::System::new();
            let _ = sys.block_on(server);
        });

        Ok(Self {
            receiver,
            base_url,
            server_handle,
            server_thread: Some(server_thread),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl QueryAPI for ActixQueryApi {
    async fn query(&mut self) -> Result<Query> {
        self.receiver
            .recv()
            .await
            .ok_or_else(|| anyhow!("query server closed"))
    }
}

impl Drop for ActixQueryApi {
    fn drop(&mut self) {
        let _ = self.server_handle.stop(true);
        if let Some(thread) = self.server_thread.take() {
            let _ = thread.join();
        }
    }
}

fn device_id(raw: Option<String>) -> Option<String> {
    raw.filter(|id| !id.is_empty())
}

async fn handle_countries(
    sender: web::Data<mpsc::Sender<Query>>,
    params: web::Query<CountriesParams>,
) -> actix_web::Result<web::Json<CountriesDto>> {
    let Some(device_id) = device_id(params.into_inner().id) else {
        tracing::debug!("countries requested without a device id");
        return Ok(web::Json(CountriesDto {
            countries: Vec::new(),
        }));
    };
    tracing::debug!(%device_id, "received countries request");
    let (response_sender, response_receiver) = oneshot::channel();
    let query = Query::countries(device_id, response_sender);

    sender
        .get_ref()
        .clone()
        .send(query)
        .await
        .map_err(|_| ErrorInternalServerError("unable to forward countries query"))?;

    let countries = response_receiver
        .await
        .map_err(|_| ErrorInternalServerError("countries responder dropped"))?
        .map_err(|err| {
            tracing::warn!(?err, "failed to read countries");
            ErrorInternalServerError("failed to read countries")
        })?;

    Ok(web::Json(CountriesDto { countries }))
}

async fn handle_save_countries(
    sender: web::Data<mpsc::Sender<Query>>,
    body: web::Json<SaveCountriesRequest>,
) -> actix_web::Result<HttpResponse> {
    let SaveCountriesRequest { id, countries } = body.into_inner();
    let Some(device_id) = device_id(id) else {
        return Ok(HttpResponse::BadRequest().json(ErrorDto::new("No id")));
    };
    tracing::debug!(%device_id, count = countries.len(), "received save request");
    let (response_sender, response_receiver) = oneshot::channel();
    let query = Query::save_countries(device_id, countries, response_sender);

    sender
        .get_ref()
        .clone()
        .send(query)
        .await
        .map_err(|_| ErrorInternalServerError("unable to forward save query"))?;

    let outcome = response_receiver
        .await
        .map_err(|_| ErrorInternalServerError("save responder dropped"))?
        .map_err(|err| {
            tracing::warn!(?err, "failed to save countries");
            ErrorInternalServerError("failed to save countries")
        })?;

    match outcome {
        SaveOutcome::Saved => Ok(HttpResponse::Ok().json(SavedDto { ok: true })),
        SaveOutcome::TooManyCountries { .. } => {
            Ok(HttpResponse::BadRequest().json(ErrorDto::new("Too many countries")))
        }
    }
}
