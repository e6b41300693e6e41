mod answer_stream;
mod connectivity;
mod upload;
