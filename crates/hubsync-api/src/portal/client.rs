// Portal device operations
//
// Typed wrappers around the portal's XHR endpoints. Every call asks the
// session for a validated handle first, so an unrecoverable auth
// failure returns before any device endpoint is touched. A 401 from the
// endpoint itself re-logs in once and repeats the call.

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::Error;
use crate::portal::models::{ControlChanges, DeviceData, Location, RawThermostat};
use crate::portal::session::PortalSession;

/// The exact body the portal returns when a command was accepted.
pub const SUBMIT_SUCCESS_BODY: &str = r#"{"success":1}"#;

const XHR_HEADER: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Raw client for the thermostat portal.
#[derive(Clone)]
pub struct PortalClient {
    session: Arc<PortalSession>,
}

impl PortalClient {
    pub fn new(session: Arc<PortalSession>) -> Self {
        Self { session }
    }

    /// The session shared by every call on this client.
    pub fn session(&self) -> &Arc<PortalSession> {
        &self.session
    }

    /// List every location with its thermostat references.
    pub async fn list_locations(&self) -> Result<Vec<Location>, Error> {
        let url = self
            .session
            .url("/portal/Location/GetLocationListData?page=1&filter=")?;

        debug!("POST {}", url);

        let resp = self
            .send(|http| {
                http.post(url.clone())
                    .header(XHR_HEADER.0, XHR_HEADER.1)
                    .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            })
            .await?;

        parse_json(resp).await
    }

    /// Fetch the live state of one thermostat.
    pub async fn device_data(&self, device_id: i64) -> Result<DeviceData, Error> {
        let url = self
            .session
            .url(&format!("/portal/Device/CheckDataSession/{device_id}"))?;

        debug!("GET {}", url);

        let resp = self
            .send(|http| http.get(url.clone()).header(XHR_HEADER.0, XHR_HEADER.1))
            .await?;

        parse_json(resp).await
    }

    /// List all thermostats across all locations, each with its current state.
    ///
    /// Order follows the portal's location order, then device order.
    /// Entries without a usable device id are skipped.
    pub async fn list_thermostats(&self) -> Result<Vec<RawThermostat>, Error> {
        let locations = self.list_locations().await?;
        let mut thermostats = Vec::new();

        for device in locations.into_iter().flat_map(|l| l.devices) {
            let Some(device_id) = device.device_id else {
                debug!("skipping location device without an id");
                continue;
            };
            thermostats.push(self.thermostat(device_id, device.name).await?);
        }

        Ok(thermostats)
    }

    /// Fetch one thermostat by id.
    pub async fn thermostat(
        &self,
        device_id: i64,
        name: Option<String>,
    ) -> Result<RawThermostat, Error> {
        let data = self.device_data(device_id).await?;
        Ok(RawThermostat {
            device_id,
            name,
            ui: data.latest_data.ui_data,
            fan: data.latest_data.fan_data,
        })
    }

    /// Submit a control-screen change. Succeeds only on the literal success body.
    pub async fn submit_changes(&self, changes: &ControlChanges) -> Result<(), Error> {
        let url = self.session.url("/portal/Device/SubmitControlScreenChanges")?;

        debug!(device_id = changes.device_id, "POST {}", url);

        let resp = self
            .send(|http| {
                http.post(url.clone())
                    .header(XHR_HEADER.0, XHR_HEADER.1)
                    .json(changes)
            })
            .await?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        if body != SUBMIT_SUCCESS_BODY {
            return Err(Error::Protocol {
                message: "portal did not acknowledge the change".into(),
                body,
            });
        }

        debug!(device_id = changes.device_id, "change accepted");
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Send a request on a validated handle.
    ///
    /// A 401 replaces the handle's login generation and sends the request
    /// once more; a second 401 is an authentication failure.
    async fn send<F>(&self, build: F) -> Result<Response, Error>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let (http, generation) = self.session.validated().await?;
        let resp = build(&http).send().await.map_err(Error::Transport)?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        let (http, generation) = self.session.reauthenticate(generation).await?;
        let resp = build(&http).send().await.map_err(Error::Transport)?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        warn!(generation, "portal rejected the operation after re-login");
        self.session.discard(generation).await;
        Err(Error::Authentication {
            message: "operation rejected after re-login".into(),
        })
    }
}

async fn parse_json<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        return Err(Error::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
