use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use roulette::{
    CountryId,
    SelectionBackend,
};
use serde::{
    Deserialize,
    Serialize,
};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8787";

#[derive(Debug, Deserialize)]
struct CountriesDto {
    #[serde(default)]
    countries: Vec<CountryId>,
}

#[derive(Debug, Serialize)]
struct SaveCountriesDto<'a> {
    id: &'a str,
    countries: &'a [CountryId],
}

/// HTTP client for the `/countries` endpoint of the selection server.
#[derive(Clone)]
pub struct SelectionClient {
    base_url: String,
    http: reqwest::Client,
}

impl SelectionClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for selection server")?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_countries(&self, device_id: &str) -> Result<Vec<CountryId>> {
        let url = format!("{}/countries", self.base_url);
        let res = self
            .http
            .get(url)
            .query(&[("id", device_id)])
            .send()
            .await
            .wrap_err("selection server request failed")?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read selection server response body")?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(eyre!(
                "selection server responded with {status} when fetching countries: {body}"
            ));
        }
        let dto: CountriesDto = serde_json::from_slice(&bytes)
            .wrap_err("invalid selection server countries payload")?;
        Ok(dto.countries)
    }

    pub async fn save_countries(
        &self,
        device_id: &str,
        countries: &[CountryId],
    ) -> Result<()> {
        let url = format!("{}/countries", self.base_url);
        let res = self
            .http
            .post(url)
            .json(&SaveCountriesDto {
                id: device_id,
                countries,
            })
            .send()
            .await
            .wrap_err("selection server request failed")?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(eyre!(
                "selection server responded with {status} when saving countries: {body}"
            ));
        }
        Ok(())
    }
}

impl SelectionBackend for SelectionClient {
    async fn load(&self, device_id: &str) -> roulette::Result<Vec<CountryId>> {
        self.fetch_countries(device_id)
            .await
            .map_err(|err| anyhow::anyhow!("{err:#}"))
    }

    async fn save(&self, device_id: &str, countries: &[CountryId]) -> roulette::Result<()> {
        self.save_countries(device_id, countries)
            .await
            .map_err(|err| anyhow::anyhow!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use selection_server::{
        app::{
            App,
            actix_query_api::{
                ActixQueryApi,
                DEFAULT_PORT,
            },
            in_memory_selection_storage::InMemorySelectionStorage,
        },
        selection::SelectionPolicy,
    };
    use std::future::pending;

    #[test]
    fn default_server_url__dials_the_server_default_port() {
        let expected = format!("http://127.0.0.1:{DEFAULT_PORT}");

        let client = SelectionClient::new(DEFAULT_SERVER_URL).unwrap();

        assert_eq!(client.base_url(), expected);
    }

    #[tokio::test]
    async fn save_then_load__round_trips_through_the_server() {
        // given
        let api = ActixQueryApi::new(None).await.unwrap();
        let client = SelectionClient::new(format!("{}/", api.base_url())).unwrap();
        let mut app = App::new(api, InMemorySelectionStorage::new(), SelectionPolicy::default());
        let countries = vec![CountryId::from("POL"), CountryId::from("CZE")];

        // when
        let save = {
            let client = client.clone();
            let countries = countries.clone();
            tokio::spawn(async move { client.save("device", &countries).await })
        };
        app.run(pending()).await.unwrap();
        save.await.unwrap().unwrap();

        let load = {
            let client = client.clone();
            tokio::spawn(async move { client.load("device").await })
        };
        app.run(pending()).await.unwrap();
        let loaded = load.await.unwrap().unwrap();

        // then
        assert_eq!(loaded, countries);
    }

    #[tokio::test]
    async fn save__rejection_is_reported_as_error() {
        // given
        let api = ActixQueryApi::new(None).await.unwrap();
        let client = SelectionClient::new(api.base_url()).unwrap();
        let mut app = App::new(api, InMemorySelectionStorage::new(), SelectionPolicy::new(1, None));
        let countries = vec![CountryId::from("POL"), CountryId::from("CZE")];

        // when
        let save = tokio::spawn(async move { client.save("device", &countries).await });
        app.run(pending()).await.unwrap();
        let result = save.await.unwrap();

        // then
        let message = result.unwrap_err().to_string();
        assert!(message.contains("400"), "{message}");
        assert!(message.contains("Too many countries"), "{message}");
    }

    #[tokio::test]
    async fn load__unreachable_server_is_an_error() {
        let client = SelectionClient::new("http://127.0.0.1:9").unwrap();

        let result = client.load("device").await;

        assert!(result.is_err());
    }
}
