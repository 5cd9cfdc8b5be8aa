//! Property-based tests for cache keys derived from procedures and endpoints

use std::collections::BTreeMap;

use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use stillwater_query::http_api::{
    http_api_query_key, EndpointRequest, HttpApi, HttpEndpoint, HttpMethod, RequestPart,
};
use stillwater_query::rpc::{rpc_query_key, Procedure, RpcGroup};

struct Search;
impl RpcGroup for Search {
    const NAME: &'static str = "search";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct SearchPayload {
    term: String,
    page: u32,
    tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NoHits;

struct FindItems;
impl Procedure for FindItems {
    type Group = Search;
    const NAME: &'static str = "findItems";
    type Payload = SearchPayload;
    type Success = Vec<String>;
    type Error = NoHits;
}

struct Catalog;
impl HttpApi for Catalog {
    const NAME: &'static str = "Catalog";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ItemPath {
    id: u64,
}
impl RequestPart for ItemPath {}

struct GetItem;
impl HttpEndpoint for GetItem {
    type Api = Catalog;
    const GROUP: &'static str = "items";
    const NAME: &'static str = "getItem";
    const METHOD: HttpMethod = HttpMethod::Get;
    const PATH: &'static str = "/items/:id";
    type Path = ItemPath;
    type UrlParams = ();
    type Payload = SearchPayload;
    type Headers = ();
    type Success = String;
    type Error = NoHits;
}
impl RequestPart for SearchPayload {}

/// Counts keyed by coordinate pairs. JSON objects only have string keys,
/// so these never serialize.
type PairCounts = BTreeMap<(u8, u8), u8>;

struct CountPairs;
impl Procedure for CountPairs {
    type Group = Search;
    const NAME: &'static str = "countPairs";
    type Payload = PairCounts;
    type Success = u32;
    type Error = NoHits;
}

#[derive(Debug, Clone, Serialize)]
struct PairTable(PairCounts);
impl RequestPart for PairTable {}

struct CountItems;
impl HttpEndpoint for CountItems {
    type Api = Catalog;
    const GROUP: &'static str = "items";
    const NAME: &'static str = "countItems";
    const METHOD: HttpMethod = HttpMethod::Post;
    const PATH: &'static str = "/items/count";
    type Path = ();
    type UrlParams = ();
    type Payload = PairTable;
    type Headers = ();
    type Success = u32;
    type Error = NoHits;
}

fn pair_counts() -> impl Strategy<Value = PairCounts> {
    prop::collection::btree_map(any::<(u8, u8)>(), any::<u8>(), 1..4)
}

fn payload() -> impl Strategy<Value = SearchPayload> {
    (
        "[a-z]{0,8}",
        any::<u32>(),
        prop::collection::vec("[a-z]{1,4}", 0..4),
    )
        .prop_map(|(term, page, tags)| SearchPayload { term, page, tags })
}

fn item_request(id: u64, payload: SearchPayload) -> EndpointRequest<GetItem> {
    EndpointRequest {
        path: ItemPath { id },
        url_params: (),
        payload,
        headers: (),
    }
}

proptest! {
    #[test]
    fn prop_rpc_keys_equal_iff_payloads_equal(a in payload(), b in payload()) {
        let same = rpc_query_key::<FindItems>(&a).unwrap() == rpc_query_key::<FindItems>(&b).unwrap();
        prop_assert_eq!(same, a == b);
    }

    #[test]
    fn prop_rpc_key_is_stable_across_clones(a in payload()) {
        prop_assert_eq!(
            rpc_query_key::<FindItems>(&a).unwrap(),
            rpc_query_key::<FindItems>(&a.clone()).unwrap()
        );
    }

    #[test]
    fn prop_http_keys_equal_iff_requests_equal(
        id_a in any::<u64>(),
        id_b in any::<u64>(),
        a in payload(),
        b in payload(),
    ) {
        let same = http_api_query_key(&item_request(id_a, a.clone())).unwrap()
            == http_api_query_key(&item_request(id_b, b.clone())).unwrap();
        prop_assert_eq!(same, id_a == id_b && a == b);
    }

    #[test]
    fn prop_http_key_starts_with_endpoint(id in any::<u64>(), a in payload()) {
        let key = http_api_query_key(&item_request(id, a)).unwrap();
        prop_assert_eq!(key.len(), 5);
        prop_assert_eq!(key.parts()[0].as_str(), Some("httpApi"));
        prop_assert_eq!(key.parts()[1].as_str(), Some("items"));
        prop_assert_eq!(key.parts()[2].as_str(), Some("getItem"));
    }

    #[test]
    fn prop_unserializable_rpc_payloads_have_no_key(a in pair_counts(), b in pair_counts()) {
        prop_assert!(rpc_query_key::<CountPairs>(&a).is_err());
        prop_assert!(rpc_query_key::<CountPairs>(&b).is_err());
    }

    #[test]
    fn prop_unserializable_http_payloads_have_no_key(a in pair_counts()) {
        let request = EndpointRequest::<CountItems> {
            path: (),
            url_params: (),
            payload: PairTable(a),
            headers: (),
        };
        let err = http_api_query_key(&request).unwrap_err();
        prop_assert_eq!(err.part, "payload");
    }
}

#[test]
fn distinct_unserializable_payloads_never_share_a_key() {
    let a = PairCounts::from([((1, 2), 1)]);
    let b = PairCounts::from([((3, 4), 9)]);
    let (ka, kb) = (rpc_query_key::<CountPairs>(&a), rpc_query_key::<CountPairs>(&b));
    assert!(ka.is_err() && kb.is_err());
}
