//! Generates the tonic client/server stubs for the `auction` gRPC package.
//!
//! Messages are hand-written prost types in `src/proto.rs`, so the services are
//! described with the manual builder and no `protoc` is needed at build time.

use tonic_build::manual::{Builder, Method, Service};

fn method(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{input}"))
        .output_type(format!("crate::proto::{output}"))
        .codec_path("tonic::codec::ProstCodec")
        .build()
}

fn main() {
    let auction = Service::builder()
        .name("Auction")
        .package("auction")
        .method(method("bid", "Bid", "BidRequest", "BidResponse"))
        .method(method("result", "Result", "ResultRequest", "ResultResponse"))
        .build();

    let election = Service::builder()
        .name("Election")
        .package("auction")
        .method(method("election", "Election", "ElectionMessage", "Response"))
        .method(method(
            "coordinator",
            "Coordinator",
            "CoordinatorMessage",
            "Response",
        ))
        .build();

    println!("cargo:rerun-if-changed=build.rs");
    Builder::new().compile(&[auction, election]);
}
