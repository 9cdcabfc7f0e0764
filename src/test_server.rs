//! A throwaway HTTP server so the client can be tested over a real socket.

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

/// One request, as the server saw it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Exchange {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Exchange {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Answer one connection per entry in `replies`, in order, then hand back
/// everything that was received.
///
/// Returns the base URL to point an [`crate::ApiClient`] at.
pub(crate) async fn serve(
    replies: Vec<(u16, &'static str)>,
) -> (String, JoinHandle<Vec<Exchange>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/api/v1", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();

        for (status, body) in replies {
            let (stream, _) = listener.accept().await.unwrap();
            let mut stream = BufReader::new(stream);

            seen.push(read_request(&mut stream).await);
            write_response(stream.get_mut(), status, body).await;
        }

        seen
    });

    (base_url, handle)
}

async fn read_request(stream: &mut BufReader<TcpStream>) -> Exchange {
    let mut line = String::new();
    stream.read_line(&mut line).await.unwrap();
    let mut words = line.split_whitespace();
    let method = words.next().unwrap().to_string();
    let target = words.next().unwrap().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        stream.read_line(&mut line).await.unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }

        let (key, value) = line.split_once(':').unwrap();
        headers.push((key.trim().to_string(), value.trim().to_string()));
    }

    let length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.parse::<usize>().unwrap())
        .unwrap_or(0);
    let mut body = vec![0; length];
    stream.read_exact(&mut body).await.unwrap();

    Exchange {
        method,
        target,
        headers,
        body: String::from_utf8(body).unwrap(),
    }
}

async fn write_response(stream: &mut TcpStream, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {} Whatever\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
}
