use std::process::ExitCode;

use etl_lib::{transform, TransformRequest, TransformResponse};
use tracing::debug;

use crate::cli::IoArgs;
use crate::formatting::{render_error, write_output};

use super::read_request;

/// Run the transform command.
pub async fn run_transform(io: &IoArgs) -> ExitCode {
    let request: TransformRequest = match read_request(&io.input) {
        Ok(request) => request,
        Err(err) => return render_error(err, io.format, io.output.as_deref()),
    };
    let rules = request.rules();
    debug!(rules = rules.rules().len(), "applying transformation rules");

    let transformed = transform(request.data.clone(), &rules);
    let body = TransformResponse::success(request.data, transformed);
    match write_output(&body, io.format, io.output.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => render_error(err, io.format, io.output.as_deref()),
    }
}
