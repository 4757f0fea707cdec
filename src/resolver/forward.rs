//! Forwarding request handler
//!
//! Lets a [`Resolver`] sit behind any server: the first question of each
//! incoming query is raced across the name servers and the answer sections
//! are copied into the reply.

use super::engine::Resolver;
use crate::dns::{Message, RecordType, ResponseCode};
use crate::server::{RequestContext, RequestHandler};
use crate::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

#[async_trait]
impl RequestHandler for Resolver {
    async fn handle(&self, ctx: RequestContext) -> Result<Message> {
        let client = ctx.client_addr().copied();
        let request = ctx.into_message();

        let Some(question) = request.question().cloned() else {
            let mut response = request.into_response();
            response.set_response_code(ResponseCode::FormErr);
            return Ok(response);
        };

        let mut upstream = Message::query(
            rand::random::<u16>(),
            question.clone(),
            request.recursion_desired(),
        );
        upstream.set_checking_disabled(request.checking_disabled());
        if let Some(size) = self.config().edns_udp_size {
            upstream.set_edns(size);
        }

        let client_edns = request.edns_udp_size();
        let mut response = request.into_response();
        response.set_recursion_available(true);
        if let Some(size) = client_edns {
            response.set_edns(size);
        }

        match self.query(upstream, None).await {
            Ok(answer) => {
                debug!(
                    client = ?client,
                    question = %question,
                    answers = answer.answers().len(),
                    "forwarded query answered"
                );
                response.set_response_code(answer.response_code());
                response.set_authoritative(answer.is_authoritative());
                response.set_authentic_data(answer.authentic_data());
                response.answers_mut().extend_from_slice(answer.answers());
                response.authority_mut().extend_from_slice(answer.authority());
                response.additional_mut().extend(
                    answer
                        .additional()
                        .iter()
                        .filter(|rr| rr.rtype() != RecordType::OPT)
                        .cloned(),
                );
            }
            Err(e) => {
                warn!(client = ?client, question = %question, error = %e, "forwarding failed");
                response.set_response_code(ResponseCode::ServFail);
            }
        }
        Ok(response)
    }
}
