use aws_sdk_lambda::types::InvocationType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeResponse {
    pub status_code: u16,
    /// Set when the function itself raised, even though the call succeeded.
    pub function_error: Option<String>,
    pub payload: Vec<u8>,
}

pub trait FunctionInvoker {
    /// Queues an asynchronous invocation and returns the acceptance status.
    fn invoke_async(&self, function_name: &str, payload: &[u8]) -> Result<u16, String>;

    /// Invokes the function and waits for its response.
    fn invoke_sync(&self, function_name: &str, payload: &[u8]) -> Result<InvokeResponse, String>;
}

#[derive(Debug, Clone)]
pub struct AwsLambdaInvoker {
    lambda_client: aws_sdk_lambda::Client,
}

impl AwsLambdaInvoker {
    pub fn new(lambda_client: aws_sdk_lambda::Client) -> Self {
        Self { lambda_client }
    }
}

impl FunctionInvoker for AwsLambdaInvoker {
    fn invoke_async(&self, function_name: &str, payload: &[u8]) -> Result<u16, String> {
        let response = self.invoke(function_name, payload, InvocationType::Event)?;
        Ok(response.status_code)
    }

    fn invoke_sync(&self, function_name: &str, payload: &[u8]) -> Result<InvokeResponse, String> {
        self.invoke(function_name, payload, InvocationType::RequestResponse)
    }
}

impl AwsLambdaInvoker {
    fn invoke(
        &self,
        function_name: &str,
        payload: &[u8],
        invocation_type: InvocationType,
    ) -> Result<InvokeResponse, String> {
        let request_payload = payload.to_vec();
        let client = self.lambda_client.clone();
        let function_name = function_name.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .invoke()
                    .function_name(&function_name)
                    .invocation_type(invocation_type)
                    .set_payload(Some(request_payload.into()))
                    .send()
                    .await
                    .map_err(|error| format!("failed to invoke lambda {function_name}: {error}"))?;

                Ok::<_, String>(InvokeResponse {
                    status_code: u16::try_from(output.status_code()).unwrap_or_default(),
                    function_error: output.function_error().map(str::to_string),
                    payload: output
                        .payload()
                        .map(|blob| blob.as_ref().to_vec())
                        .unwrap_or_default(),
                })
            })
        })
    }
}
