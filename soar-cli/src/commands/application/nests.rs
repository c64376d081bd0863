use anyhow::Result;
use clap::Subcommand;
use reqwest::Method;

use crate::commands::{Api, PageArgs};

#[derive(Subcommand, Debug)]
pub enum NestsCommands {
    /// List nests
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Get a nest by ID
    Get { id: u32 },
    /// List the eggs of a nest
    Eggs { nest: u32 },
    /// Get one egg of a nest
    Egg { nest: u32, egg: u32 },
}

pub fn handle(api: &Api<'_>, cmd: NestsCommands) -> Result<()> {
    match cmd {
        NestsCommands::List { page } => {
            let req = api.request(Method::GET, "/api/application/nests", None)?;
            api.collection(req, &page)
        }
        NestsCommands::Get { id } => {
            let req = api.request(Method::GET, &format!("/api/application/nests/{id}"), None)?;
            api.item(req)
        }
        NestsCommands::Eggs { nest } => {
            let req = api.request(
                Method::GET,
                &format!("/api/application/nests/{nest}/eggs"),
                None,
            )?;
            api.collection(req, &PageArgs::default())
        }
        NestsCommands::Egg { nest, egg } => {
            let req = api.request(
                Method::GET,
                &format!("/api/application/nests/{nest}/eggs/{egg}"),
                None,
            )?;
            api.item(req)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::ctx;
    use crate::config::ScopeKind;
    use httpmock::prelude::*;

    #[test]
    fn eggs_keep_wire_order() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/application/nests/1/eggs");
            then.status(200).body(
                r#"{"object":"list","data":[{"object":"egg","attributes":{"id":3,"name":"Paper"}},{"object":"egg","attributes":{"id":1,"name":"Vanilla"}}]}"#,
            );
        });

        let (ctx, out) = ctx(&server);
        let api = ctx.api(ScopeKind::Application).unwrap();
        handle(&api, NestsCommands::Eggs { nest: 1 }).unwrap();

        mock.assert();
        assert_eq!(
            out.text(),
            "[{\"id\":3,\"name\":\"Paper\"},{\"id\":1,\"name\":\"Vanilla\"}]\n"
        );
    }

    #[test]
    fn mismatched_envelope_is_a_parse_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/application/nests/1");
            then.status(200).body(r#"{"object":"list","data":[]}"#);
        });

        let (ctx, _) = ctx(&server);
        let api = ctx.api(ScopeKind::Application).unwrap();
        let err = handle(&api, NestsCommands::Get { id: 1 }).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse response"));
    }
}
