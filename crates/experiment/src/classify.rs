//! Client for the external classification service.
//!
//! The service receives the path of an exported block as UTF-8 text and
//! answers with the predicted stimulus index as a decimal integer.

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use erp_types::ErpError;

pub async fn classify(address: &str, path: &Path, timeout: Duration) -> Result<usize, ErpError> {
    let request = async {
        let mut stream = TcpStream::connect(address).await?;
        debug!("Connected to classifier at {}", address);
        stream
            .write_all(path.to_string_lossy().as_bytes())
            .await?;
        stream.shutdown().await?;

        let mut response = Vec::with_capacity(64);
        stream.read_to_end(&mut response).await?;
        Ok::<_, std::io::Error>(response)
    };

    let response = tokio::time::timeout(timeout, request)
        .await
        .map_err(|_| ErpError::Classification(format!("no answer from {} within {:?}", address, timeout)))?
        .map_err(|e| ErpError::Classification(format!("{}: {}", address, e)))?;

    let text = String::from_utf8_lossy(&response);
    let index = parse_selection(&text)?;
    info!("Classifier predicted {} for {}", index, path.display());
    Ok(index)
}

pub fn parse_selection(text: &str) -> Result<usize, ErpError> {
    text.trim()
        .parse()
        .map_err(|_| ErpError::Classification(format!("unparseable answer {:?}", text.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection(" 2\n").unwrap(), 2);
        assert!(matches!(parse_selection("left"), Err(ErpError::Classification(_))));
        assert!(parse_selection("").is_err());
    }

    #[tokio::test]
    async fn test_round_trip_with_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = String::new();
            socket.read_to_string(&mut request).await.unwrap();
            socket.write_all(b"3").await.unwrap();
            request
        });

        let index = classify(&address, Path::new("Data/Subject_1_Data.csv"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(index, 3);
        assert_eq!(server.await.unwrap(), "Data/Subject_1_Data.csv");
    }

    #[tokio::test]
    async fn test_unreachable_classifier() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        let err = classify(&address, Path::new("x.csv"), Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, ErpError::Classification(_)));
    }
}
