use std::process::ExitCode;

use etl_lib::{Config, TransferEngine, TransferRequest, TransferResponse};

use crate::cli::IoArgs;
use crate::formatting::{render_error, write_output};

use super::read_request;

/// Run the transfer command.
pub async fn run_transfer(config: &Config, io: &IoArgs) -> ExitCode {
    let request: TransferRequest = match read_request(&io.input) {
        Ok(request) => request,
        Err(err) => return render_error(err, io.format, io.output.as_deref()),
    };
    let engine = match TransferEngine::new(&config.transfer) {
        Ok(engine) => engine,
        Err(err) => return render_error(err, io.format, io.output.as_deref()),
    };

    let result = engine
        .transfer(
            &request.data,
            &request.destination,
            request.transfer_config.as_ref(),
        )
        .await;
    match result {
        Ok(result) => {
            let body = TransferResponse::from(result);
            match write_output(&body, io.format, io.output.as_deref()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => render_error(err, io.format, io.output.as_deref()),
            }
        }
        Err(err) => render_error(err, io.format, io.output.as_deref()),
    }
}
