use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    #[snafu(display("sqs receive failed: {source}"))]
    Receive {
        source: aws_sdk_sqs::error::SdkError<
            aws_sdk_sqs::operation::receive_message::ReceiveMessageError,
        >,
    },

    #[snafu(display("sqs send failed: {source}"))]
    Send {
        source:
            aws_sdk_sqs::error::SdkError<aws_sdk_sqs::operation::send_message::SendMessageError>,
    },

    #[snafu(display("sqs delete failed: {source}"))]
    Delete {
        source: aws_sdk_sqs::error::SdkError<
            aws_sdk_sqs::operation::delete_message::DeleteMessageError,
        >,
    },

    #[snafu(display("message body is not valid json: {source}"))]
    Decode { source: serde_json::Error },

    #[snafu(display("queue message had no body"))]
    EmptyBody,
}

pub type Result<T> = std::result::Result<T, QueueError>;
